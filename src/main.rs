use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder};

use tft_etl::config::{PipelineConfig, Settings};
use tft_etl::error::SchemaError;
use tft_etl::flatten::flatten;
use tft_etl::loader::write_fragment;
use tft_etl::model::{MatchRecord, decode};
use tft_etl::pipeline::Pipeline;
use tft_etl::riot_api::RiotClient;
use tft_etl::schema::TableName;
use tft_etl::store::PgStore;

#[derive(Parser, Debug)]
#[command(name = "tft-etl", about = "Loads ranked TFT match data into PostgreSQL", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the top players' recent matches and load them
    Run(RunArgs),

    /// Print the CREATE TABLE statements for the destination tables
    Schema {
        /// Only this table (match_data, player_metadata, player_units, player_traits)
        #[arg(long)]
        table: Option<String>,
    },

    /// Flatten a saved match payload and print one table's rows
    Flatten {
        /// Match JSON as returned by the match endpoint
        #[arg(long)]
        file: PathBuf,

        /// Destination table to render
        #[arg(long, default_value = "match_data")]
        table: String,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Platform routing value for league and summoner lookups
    #[arg(long, default_value = "NA1")]
    platform: String,

    /// Regional routing value for match lookups
    #[arg(long, default_value = "AMERICAS")]
    region: String,

    /// Number of top challenger players to follow
    #[arg(long, default_value_t = 10)]
    players: usize,

    /// Recent matches to fetch per player
    #[arg(long, default_value_t = 9)]
    matches: usize,

    /// Comma separated subset of tables to load (default: all)
    #[arg(long, value_delimiter = ',')]
    tables: Vec<String>,
}

fn main() -> Result<()> {
    init_tracing("info")?;
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run(args),
        Command::Schema { table } => print_schema(table.as_deref()),
        Command::Flatten { file, table } => flatten_file(&file, &table),
    }
}

fn init_tracing(default_filter: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}

fn parse_tables(names: &[String]) -> Result<Vec<TableName>, SchemaError> {
    if names.is_empty() {
        return Ok(TableName::ALL.to_vec());
    }

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let table = name.trim().parse::<TableName>()?;
        if !tables.contains(&table) {
            tables.push(table);
        }
    }
    Ok(tables)
}

fn run(args: RunArgs) -> Result<()> {
    let tables = parse_tables(&args.tables)?;
    let settings = Settings::from_env().context("loading settings")?;
    info!(db = ?settings.db, "settings loaded");

    let client = RiotClient::new(&settings.api_key)?;
    let store = PgStore::new(&settings.db);
    let config = PipelineConfig {
        platform: args.platform,
        region: args.region,
        players: args.players,
        matches_per_player: args.matches,
        tables,
    };

    let summary = Pipeline::new(&client, &store, config).run()?;

    for (table, totals) in &summary.tables {
        info!(
            table = %table,
            staged = totals.staged,
            inserted = totals.inserted,
            created = totals.created,
            "table totals"
        );
    }
    info!(
        started_at = %summary.started_at,
        players = summary.players,
        matches = summary.matches,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "Total ETL runtime"
    );

    Ok(())
}

fn print_schema(table: Option<&str>) -> Result<()> {
    let tables = match table {
        Some(name) => vec![name.parse::<TableName>()?],
        None => TableName::ALL.to_vec(),
    };

    for table in tables {
        println!("{};\n", table.schema().create_table_sql());
    }

    Ok(())
}

fn flatten_file(file: &Path, table: &str) -> Result<()> {
    let table = table.parse::<TableName>()?;
    let body = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let record: MatchRecord = decode(&file.display().to_string(), &body)?;
    let fragments = flatten(&record)?;

    write_fragment(fragments.get(table), io::stdout().lock(), true)?;

    Ok(())
}
