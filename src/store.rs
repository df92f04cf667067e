//! Relational store access.
//!
//! A `Store` hands out one `Session` per unit of work; the session owns its
//! connection and closes it when dropped. `PgStore` is the PostgreSQL
//! implementation.

use std::io::Write;

use postgres::{Client, Config, NoTls};
use tracing::debug;

use crate::config::DbSettings;
use crate::error::StoreError;
use crate::schema::TableSchema;

/// Statements and payload for one staged merge. The store runs them as a
/// single transaction: create the staging table, bulk copy the payload into
/// it, insert into the destination skipping existing keys.
#[derive(Debug)]
pub struct StagedMerge<'a> {
    pub schema: &'static TableSchema,
    pub create_staging: String,
    pub copy_in: String,
    pub insert: String,
    /// `|` separated CSV rows in `schema` column order, no header.
    pub payload: &'a [u8],
}

pub trait Session {
    fn table_exists(&mut self, table: &str) -> Result<bool, StoreError>;

    fn create_table(&mut self, schema: &TableSchema) -> Result<(), StoreError>;

    /// Returns the number of rows inserted into the destination table.
    fn merge(&mut self, merge: &StagedMerge<'_>) -> Result<u64, StoreError>;
}

pub trait Store {
    fn session(&self) -> Result<Box<dyn Session + '_>, StoreError>;
}

pub struct PgStore {
    config: Config,
}

impl PgStore {
    pub fn new(settings: &DbSettings) -> Self {
        let mut config = Config::new();
        config
            .host(&settings.host)
            .port(settings.port)
            .dbname(&settings.database)
            .user(&settings.user)
            .password(&settings.password);

        Self { config }
    }
}

impl Store for PgStore {
    fn session(&self) -> Result<Box<dyn Session + '_>, StoreError> {
        let client = self.config.connect(NoTls)?;
        debug!("opened store session");
        Ok(Box::new(PgSession { client }))
    }
}

struct PgSession {
    client: Client,
}

impl Session for PgSession {
    fn table_exists(&mut self, table: &str) -> Result<bool, StoreError> {
        let row = self.client.query_one(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1)",
            &[&table],
        )?;
        Ok(row.get(0))
    }

    fn create_table(&mut self, schema: &TableSchema) -> Result<(), StoreError> {
        self.client.batch_execute(&schema.create_table_sql())?;
        Ok(())
    }

    fn merge(&mut self, merge: &StagedMerge<'_>) -> Result<u64, StoreError> {
        // Dropping the transaction on any early return rolls it back, which
        // also discards the staging table.
        let mut tx = self.client.transaction()?;

        tx.batch_execute(&merge.create_staging)?;

        let mut writer = tx.copy_in(merge.copy_in.as_str())?;
        writer.write_all(merge.payload)?;
        let staged = writer.finish()?;

        let inserted = tx.execute(merge.insert.as_str(), &[])?;
        tx.commit()?;

        debug!(table = merge.schema.name, staged, inserted, "merge committed");
        Ok(inserted)
    }
}

impl Drop for PgSession {
    fn drop(&mut self) {
        debug!("closing store session");
    }
}
