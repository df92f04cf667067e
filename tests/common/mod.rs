#![allow(dead_code)]

use reqwest::StatusCode;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;

use tft_etl::error::{ApiError, StoreError};
use tft_etl::loader::DELIMITER;
use tft_etl::model::{LeagueEntry, MatchRecord, decode, top_entries};
use tft_etl::riot_api::MatchSource;
use tft_etl::schema::TableSchema;
use tft_etl::store::{Session, StagedMerge, Store};

/// Builds a match payload. Each participant is `(puuid, units, traits)`.
pub fn match_json(match_id: &str, participants: &[(&str, usize, usize)]) -> Value {
    let players: Vec<Value> = participants
        .iter()
        .enumerate()
        .map(|(idx, (puuid, units, traits))| {
            let units: Vec<Value> = (0..*units)
                .map(|u| {
                    json!({
                        "character_id": format!("TFT9_Unit{}", u),
                        "itemNames": ["TFT_Item_A", "TFT_Item_B"],
                        "name": "",
                        "rarity": u,
                        "tier": 2
                    })
                })
                .collect();
            let traits: Vec<Value> = (0..*traits)
                .map(|t| {
                    json!({
                        "name": format!("Set9_Trait{}", t),
                        "num_units": 3,
                        "style": 1,
                        "tier_current": 1,
                        "tier_total": 3
                    })
                })
                .collect();

            json!({
                "companion": {"content_ID": "c-1", "skin_ID": 1, "species": "PetTFTAvatar"},
                "gold_left": 2,
                "last_round": 30,
                "level": 8,
                "placement": idx + 1,
                "players_eliminated": 1,
                "puuid": puuid,
                "time_eliminated": 1800.25,
                "total_damage_to_players": 90,
                "traits": traits,
                "units": units
            })
        })
        .collect();

    json!({
        "metadata": {
            "data_version": "5",
            "match_id": match_id,
            "participants": participants.iter().map(|(puuid, _, _)| *puuid).collect::<Vec<_>>()
        },
        "info": {
            "game_datetime": 1690000000000u64,
            "game_length": 2000.5,
            "game_version": "Version 13.14",
            "participants": players
        }
    })
}

pub fn record(payload: &Value) -> MatchRecord {
    decode("match", payload.to_string().as_bytes()).unwrap()
}

pub fn entry_with_puuid(puuid: &str, league_points: i64) -> LeagueEntry {
    LeagueEntry {
        summoner_id: None,
        puuid: Some(puuid.to_string()),
        league_points,
    }
}

#[derive(Default)]
pub struct FakeSource {
    pub league: Vec<LeagueEntry>,
    pub summoners: HashMap<String, String>,
    pub histories: HashMap<String, Vec<String>>,
    pub matches: HashMap<String, Value>,
    pub calls: RefCell<Vec<String>>,
}

impl FakeSource {
    pub fn with_match(mut self, payload: Value) -> Self {
        let match_id = payload["metadata"]["match_id"].as_str().unwrap().to_string();
        self.matches.insert(match_id, payload);
        self
    }

    pub fn with_player(mut self, puuid: &str, league_points: i64, history: &[&str]) -> Self {
        self.league.push(entry_with_puuid(puuid, league_points));
        self.histories.insert(
            puuid.to_string(),
            history.iter().map(|id| id.to_string()).collect(),
        );
        self
    }

    pub fn match_fetches(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| call.strip_prefix("match:").map(str::to_string))
            .collect()
    }

    fn not_found(url: String) -> ApiError {
        ApiError::Status {
            url,
            status: StatusCode::NOT_FOUND,
        }
    }
}

impl MatchSource for FakeSource {
    fn top_players(&self, _platform: &str, count: usize) -> Result<Vec<LeagueEntry>, ApiError> {
        self.calls.borrow_mut().push("league".to_string());
        Ok(top_entries(self.league.clone(), count))
    }

    fn resolve_player_id(&self, _platform: &str, summoner_id: &str) -> Result<String, ApiError> {
        self.calls.borrow_mut().push(format!("summoner:{}", summoner_id));
        self.summoners
            .get(summoner_id)
            .cloned()
            .ok_or_else(|| Self::not_found(format!("summoner/{}", summoner_id)))
    }

    fn recent_match_ids(
        &self,
        _region: &str,
        puuid: &str,
        count: usize,
    ) -> Result<Vec<String>, ApiError> {
        self.calls.borrow_mut().push(format!("history:{}", puuid));
        let history = self.histories.get(puuid).cloned().unwrap_or_default();
        Ok(history.into_iter().take(count).collect())
    }

    fn match_by_id(&self, _region: &str, match_id: &str) -> Result<MatchRecord, ApiError> {
        self.calls.borrow_mut().push(format!("match:{}", match_id));
        let payload = self
            .matches
            .get(match_id)
            .ok_or_else(|| Self::not_found(format!("matches/{}", match_id)))?;
        decode(&format!("match {}", match_id), payload.to_string().as_bytes())
    }
}

#[derive(Debug, Default)]
pub struct MemTable {
    pub rows: Vec<Vec<String>>,
    keys: HashSet<Vec<String>>,
}

#[derive(Debug, Default)]
pub struct StoreState {
    pub tables: BTreeMap<String, MemTable>,
    pub created: Vec<String>,
    pub merges: Vec<String>,
    pub sessions_opened: usize,
    pub sessions_closed: usize,
    pub staging_tables: HashSet<String>,
    pub fail_merge_for: Option<String>,
}

/// In-memory store with the skip-on-conflict merge semantics of the real one.
#[derive(Default)]
pub struct MemoryStore {
    pub state: RefCell<StoreState>,
}

impl MemoryStore {
    pub fn failing_on(table: &str) -> Self {
        let store = Self::default();
        store.state.borrow_mut().fail_merge_for = Some(table.to_string());
        store
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.state
            .borrow()
            .tables
            .get(table)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.state.borrow().tables.contains_key(table)
    }

    pub fn rows(&self, table: &str) -> Vec<Vec<String>> {
        self.state
            .borrow()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }
}

impl Store for MemoryStore {
    fn session(&self) -> Result<Box<dyn Session + '_>, StoreError> {
        self.state.borrow_mut().sessions_opened += 1;
        Ok(Box::new(MemorySession { store: self }))
    }
}

struct MemorySession<'a> {
    store: &'a MemoryStore,
}

impl Drop for MemorySession<'_> {
    fn drop(&mut self) {
        self.store.state.borrow_mut().sessions_closed += 1;
    }
}

fn key_positions(schema: &TableSchema) -> Vec<usize> {
    schema
        .primary_key
        .iter()
        .map(|key| schema.column_names().position(|c| c == *key).unwrap())
        .collect()
}

impl Session for MemorySession<'_> {
    fn table_exists(&mut self, table: &str) -> Result<bool, StoreError> {
        Ok(self.store.state.borrow().tables.contains_key(table))
    }

    fn create_table(&mut self, schema: &TableSchema) -> Result<(), StoreError> {
        let mut state = self.store.state.borrow_mut();
        if state.tables.contains_key(schema.name) {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("relation \"{}\" already exists", schema.name),
            )));
        }
        state.tables.insert(schema.name.to_string(), MemTable::default());
        state.created.push(schema.name.to_string());
        Ok(())
    }

    fn merge(&mut self, merge: &StagedMerge<'_>) -> Result<u64, StoreError> {
        let staging = format!("tmp_{}", merge.schema.name);
        assert!(merge.create_staging.contains(&staging));
        assert!(merge.copy_in.starts_with(&format!("COPY {} ", staging)));

        let mut state = self.store.state.borrow_mut();
        state.staging_tables.insert(staging.clone());
        state.merges.push(merge.insert.clone());

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(false)
            .from_reader(merge.payload);
        let staged: Vec<Vec<String>> = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<Result<_, _>>()?;

        if state.fail_merge_for.as_deref() == Some(merge.schema.name) {
            // rollback drops the staging table with everything else
            state.staging_tables.remove(&staging);
            return Err(StoreError::Io(io::Error::other("merge failed")));
        }

        let positions = key_positions(merge.schema);
        let mut table = state
            .tables
            .remove(merge.schema.name)
            .expect("merge into missing table");
        let mut inserted = 0;
        for row in staged {
            assert_eq!(row.len(), merge.schema.columns.len());
            let key: Vec<String> = positions.iter().map(|&p| row[p].clone()).collect();
            if table.keys.insert(key) {
                table.rows.push(row);
                inserted += 1;
            }
        }
        state.tables.insert(merge.schema.name.to_string(), table);
        state.staging_tables.remove(&staging);

        Ok(inserted)
    }
}
