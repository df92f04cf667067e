//! Discovery and the per-match extract/load loop.
//!
//! A run walks top players -> their ids -> their recent matches, then for
//! each unique match fetches, flattens and loads it before moving on to the
//! next. Any error ends the run; rows committed for earlier matches stay.

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::{ApiError, EtlError};
use crate::flatten::flatten;
use crate::loader::{LoadOutcome, load};
use crate::model::{LeagueEntry, MatchRecord};
use crate::riot_api::MatchSource;
use crate::schema::TableName;
use crate::store::Store;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableTotals {
    pub staged: usize,
    pub inserted: u64,
    pub created: bool,
}

impl TableTotals {
    fn add(&mut self, outcome: &LoadOutcome) {
        self.staged += outcome.staged;
        self.inserted += outcome.inserted;
        self.created |= outcome.created();
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub players: usize,
    pub matches: usize,
    pub tables: BTreeMap<TableName, TableTotals>,
    pub elapsed: Duration,
}

pub struct Pipeline<'a> {
    source: &'a dyn MatchSource,
    store: &'a dyn Store,
    config: PipelineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(source: &'a dyn MatchSource, store: &'a dyn Store, config: PipelineConfig) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    pub fn run(&self) -> Result<RunSummary, EtlError> {
        let started_at = Utc::now();
        let start = Instant::now();
        info!(
            platform = %self.config.platform,
            region = %self.config.region,
            players = self.config.players,
            matches_per_player = self.config.matches_per_player,
            "beginning ETL run"
        );

        let entries = timed("top_players", || {
            self.source
                .top_players(&self.config.platform, self.config.players)
                .map_err(EtlError::fetch("top players"))
        })?;

        let puuids = timed("resolve_player_ids", || self.resolve_player_ids(&entries))?;

        let match_ids = timed("match_ids", || self.match_ids(&puuids))?;
        info!(players = puuids.len(), matches = match_ids.len(), "discovered matches");

        let mut tables: BTreeMap<TableName, TableTotals> = self
            .config
            .tables
            .iter()
            .map(|table| (*table, TableTotals::default()))
            .collect();

        // Fetching and loading interleave per match; each keeps its own clock.
        let mut fetching = StageClock::new("match_data");
        let mut loading = StageClock::new("extract_load");
        let result = self.fetch_and_load(&match_ids, &mut fetching, &mut loading, &mut tables);
        fetching.finish();
        loading.finish();
        result?;

        let summary = RunSummary {
            started_at,
            players: puuids.len(),
            matches: match_ids.len(),
            tables,
            elapsed: start.elapsed(),
        };
        info!(
            elapsed_ms = summary.elapsed.as_millis() as u64,
            matches = summary.matches,
            "ETL run finished"
        );

        Ok(summary)
    }

    fn resolve_player_ids(&self, entries: &[LeagueEntry]) -> Result<Vec<String>, EtlError> {
        entries
            .iter()
            .map(|entry| match (&entry.puuid, &entry.summoner_id) {
                (Some(puuid), _) => Ok(puuid.clone()),
                (None, Some(summoner_id)) => self
                    .source
                    .resolve_player_id(&self.config.platform, summoner_id)
                    .map_err(EtlError::fetch("resolve player ids")),
                (None, None) => Err(EtlError::fetch("resolve player ids")(
                    ApiError::UnidentifiedEntry,
                )),
            })
            .collect()
    }

    fn match_ids(&self, puuids: &[String]) -> Result<Vec<String>, EtlError> {
        let per_player = puuids
            .iter()
            .map(|puuid| {
                self.source
                    .recent_match_ids(&self.config.region, puuid, self.config.matches_per_player)
                    .map_err(EtlError::fetch("match ids"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(unique_match_ids(per_player))
    }

    fn fetch_and_load(
        &self,
        match_ids: &[String],
        fetching: &mut StageClock,
        loading: &mut StageClock,
        tables: &mut BTreeMap<TableName, TableTotals>,
    ) -> Result<(), EtlError> {
        for (idx, match_id) in match_ids.iter().enumerate() {
            debug!(match_id = %match_id, n = idx + 1, total = match_ids.len(), "processing match");
            let record = fetching.time(|| {
                self.source
                    .match_by_id(&self.config.region, match_id)
                    .map_err(EtlError::fetch("match data"))
            })?;
            for outcome in loading.time(|| self.extract_load(&record))? {
                tables.entry(outcome.table).or_default().add(&outcome);
            }
        }

        Ok(())
    }

    /// Flattens one match and loads it into every configured table.
    fn extract_load(&self, record: &MatchRecord) -> Result<Vec<LoadOutcome>, EtlError> {
        let fragments = flatten(record)?;

        self.config
            .tables
            .iter()
            .map(|table| load(self.store, fragments.get(*table)).map_err(EtlError::load(*table)))
            .collect()
    }
}

/// Union of the per-player lists, each id once, in first-seen order.
pub fn unique_match_ids<I>(per_player: I) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    per_player
        .into_iter()
        .flatten()
        .collect::<IndexSet<String>>()
        .into_iter()
        .collect()
}

fn timed<T, E>(stage: &'static str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
    let start = Instant::now();
    let result = f();
    stage_finished(stage, start.elapsed(), result.is_ok());
    result
}

/// Accumulated time for a stage whose work is spread over the match loop.
struct StageClock {
    stage: &'static str,
    elapsed: Duration,
    ok: bool,
}

impl StageClock {
    fn new(stage: &'static str) -> Self {
        Self {
            stage,
            elapsed: Duration::ZERO,
            ok: true,
        }
    }

    fn time<T, E>(&mut self, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let start = Instant::now();
        let result = f();
        self.elapsed += start.elapsed();
        self.ok &= result.is_ok();
        result
    }

    fn finish(self) {
        stage_finished(self.stage, self.elapsed, self.ok);
    }
}

fn stage_finished(stage: &'static str, elapsed: Duration, ok: bool) {
    info!(
        stage,
        elapsed_ms = elapsed.as_millis() as u64,
        ok,
        "stage finished"
    );
}
