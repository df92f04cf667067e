use reqwest::StatusCode;
use thiserror::Error;

use crate::schema::TableName;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing env var {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for env var {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: StatusCode },

    #[error("too many requests for URL {url}")]
    RateLimited { url: String },

    #[error("malformed {resource} payload: {source}")]
    Malformed {
        resource: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("league entry has neither puuid nor summonerId")]
    UnidentifiedEntry,

    #[error("invalid API key header: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown destination table {0:?}")]
    UnknownTable(String),

    #[error("row for {table} has no value for column {column}")]
    MissingColumn { table: TableName, column: &'static str },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Postgres(#[from] postgres::Error),

    #[error("failed to stream staged rows: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode staged rows: {0}")]
    Encode(#[from] csv::Error),
}

/// Run-level failure, one variant per failure class.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("fetch failed during {stage}: {source}")]
    Fetch {
        stage: &'static str,
        #[source]
        source: ApiError,
    },

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("load into {table} failed: {source}")]
    Load {
        table: TableName,
        #[source]
        source: StoreError,
    },
}

impl EtlError {
    pub fn fetch(stage: &'static str) -> impl FnOnce(ApiError) -> Self {
        move |source| Self::Fetch { stage, source }
    }

    pub fn load(table: TableName) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Load { table, source }
    }
}
