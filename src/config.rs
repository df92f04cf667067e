//! Runtime configuration.
//!
//! Credentials come from the environment (optionally via a `.env` file):
//! - `RIOT_API_KEY`
//! - `RIOT_DB_HOST`, `RIOT_DB_PORT` (default 5432), `RIOT_DB_DBNAME`,
//!   `RIOT_DB_USER`, `RIOT_DB_PASSWORD`
//!
//! Run parameters live in `PipelineConfig`, built by the caller.

use std::env;
use std::fmt;

use crate::error::ConfigError;
use crate::schema::TableName;

pub const DEFAULT_DB_PORT: u16 = 5432;

#[derive(Clone)]
pub struct Settings {
    pub api_key: String,
    pub db: DbSettings,
}

#[derive(Clone)]
pub struct DbSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &"****")
            .field("db", &self.db)
            .finish()
    }
}

impl fmt::Debug for DbSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"****")
            .finish()
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match non_empty(&lookup, "RIOT_DB_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                key: "RIOT_DB_PORT",
                value: raw,
            })?,
            None => DEFAULT_DB_PORT,
        };

        Ok(Self {
            api_key: required(&lookup, "RIOT_API_KEY")?,
            db: DbSettings {
                host: required(&lookup, "RIOT_DB_HOST")?,
                port,
                database: required(&lookup, "RIOT_DB_DBNAME")?,
                user: required(&lookup, "RIOT_DB_USER")?,
                password: required(&lookup, "RIOT_DB_PASSWORD")?,
            },
        })
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, key).ok_or(ConfigError::Missing(key))
}

/// What one run fetches and where it loads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Platform routing value for league and summoner lookups, e.g. `NA1`.
    pub platform: String,
    /// Regional routing value for match lookups, e.g. `AMERICAS`.
    pub region: String,
    pub players: usize,
    pub matches_per_player: usize,
    pub tables: Vec<TableName>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            platform: "NA1".to_string(),
            region: "AMERICAS".to_string(),
            players: 10,
            matches_per_player: 9,
            tables: TableName::ALL.to_vec(),
        }
    }
}
