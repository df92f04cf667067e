use std::io::Write;

use csv::WriterBuilder;
use tracing::info;

use crate::error::StoreError;
use crate::normalize::Fragment;
use crate::schema::{TableName, TableSchema, TableState, ensure_table};
use crate::store::{StagedMerge, Store};

pub const DELIMITER: u8 = b'|';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    pub table: TableName,
    pub state: TableState,
    pub staged: usize,
    pub inserted: u64,
}

impl LoadOutcome {
    /// Whether this load created the destination table.
    pub fn created(&self) -> bool {
        self.state == TableState::Created
    }
}

pub fn staging_table(schema: &TableSchema) -> String {
    format!("tmp_{}", schema.name)
}

/// Builds the staging and merge statements for `schema`. The staging table
/// copies the destination's columns and defaults and is dropped at commit.
pub fn merge_statements(schema: &TableSchema) -> (String, String, String) {
    let staging = staging_table(schema);
    let columns = schema.column_list();

    let create_staging = format!(
        "CREATE TEMP TABLE {staging} (LIKE {table} INCLUDING DEFAULTS) ON COMMIT DROP",
        table = schema.name
    );
    let copy_in = format!(
        "COPY {staging} ({columns}) FROM STDIN WITH (FORMAT csv, DELIMITER '|', NULL '')"
    );
    let insert = format!(
        "INSERT INTO {table} ({columns}) SELECT {columns} FROM {staging} ON CONFLICT DO NOTHING",
        table = schema.name
    );

    (create_staging, copy_in, insert)
}

/// Writes the fragment as `|` separated CSV, optionally with a header row.
pub fn write_fragment<W: Write>(
    fragment: &Fragment,
    out: W,
    with_header: bool,
) -> Result<W, StoreError> {
    let mut writer = WriterBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .from_writer(out);

    if with_header {
        writer.write_record(&fragment.columns)?;
    }
    for row in &fragment.rows {
        writer.write_record(row)?;
    }

    writer
        .into_inner()
        .map_err(|err| StoreError::Io(err.into_error()))
}

pub fn encode_rows(fragment: &Fragment) -> Result<Vec<u8>, StoreError> {
    write_fragment(fragment, Vec::new(), false)
}

/// Loads one fragment into its table, creating the table on first write.
///
/// Rows whose key is already present are skipped, so loading the same
/// fragment twice inserts nothing the second time. A fresh session is
/// opened for the call and closed before it returns.
pub fn load(store: &dyn Store, fragment: &Fragment) -> Result<LoadOutcome, StoreError> {
    let schema = fragment.table.schema();
    let mut session = store.session()?;

    let state = ensure_table(session.as_mut(), fragment)?;
    let mut outcome = LoadOutcome {
        table: fragment.table,
        state,
        staged: 0,
        inserted: 0,
    };

    if fragment.is_empty() {
        info!(table = schema.name, ?state, "nothing to load");
        return Ok(outcome);
    }

    let payload = encode_rows(fragment)?;
    let (create_staging, copy_in, insert) = merge_statements(schema);
    let inserted = session.merge(&StagedMerge {
        schema,
        create_staging,
        copy_in,
        insert,
        payload: &payload,
    })?;

    outcome.staged = fragment.len();
    outcome.inserted = inserted;
    info!(
        table = schema.name,
        staged = outcome.staged,
        inserted,
        created = outcome.created(),
        "inserted data"
    );

    Ok(outcome)
}
