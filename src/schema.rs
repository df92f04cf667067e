//! Destination tables and their fixed definitions.
//!
//! Each table is described once as static data; the DDL, the staging
//! statements and the column layout used by the normalizer are all derived
//! from it. Adding a table means adding a `TableSchema` and a `TableName`.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use tracing::info;

use crate::error::{SchemaError, StoreError};
use crate::normalize::Fragment;
use crate::store::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableName {
    MatchData,
    PlayerMetadata,
    PlayerUnits,
    PlayerTraits,
}

impl TableName {
    pub const ALL: [TableName; 4] = [
        TableName::MatchData,
        TableName::PlayerMetadata,
        TableName::PlayerUnits,
        TableName::PlayerTraits,
    ];

    pub fn as_str(self) -> &'static str {
        self.schema().name
    }

    pub fn schema(self) -> &'static TableSchema {
        match self {
            TableName::MatchData => &MATCH_DATA,
            TableName::PlayerMetadata => &PLAYER_METADATA,
            TableName::PlayerUnits => &PLAYER_UNITS,
            TableName::PlayerTraits => &PLAYER_TRAITS,
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableName {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TableName::ALL
            .into_iter()
            .find(|table| table.as_str() == s)
            .ok_or_else(|| SchemaError::UnknownTable(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    TextArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Text,
        }
    }

    const fn array(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::TextArray,
        }
    }
}

#[derive(Debug)]
pub struct TableSchema {
    pub name: &'static str,
    /// Loaded columns, in table order. The trailing load timestamp is not
    /// listed; it is filled by the column default.
    pub columns: &'static [Column],
    pub primary_key: &'static [&'static str],
}

pub const TIMESTAMP_COLUMN: &str = "timestamp";

pub static MATCH_DATA: TableSchema = TableSchema {
    name: "match_data",
    columns: &[
        Column::text("match_id"),
        Column::text("match_datetime"),
        Column::text("match_length"),
        Column::text("game_version"),
        Column::text("data_version"),
        Column::array("participants"),
    ],
    primary_key: &["match_id"],
};

pub static PLAYER_METADATA: TableSchema = TableSchema {
    name: "player_metadata",
    columns: &[
        Column::text("puuid"),
        Column::text("match_id"),
        Column::text("gold_left"),
        Column::text("last_round"),
        Column::text("level"),
        Column::text("placement"),
        Column::text("players_eliminated"),
        Column::text("time_eliminated"),
        Column::text("total_damage_to_players"),
        Column::text("companion.content_ID"),
        Column::text("companion.skin_ID"),
        Column::text("companion.species"),
    ],
    primary_key: &["puuid", "match_id"],
};

pub static PLAYER_UNITS: TableSchema = TableSchema {
    name: "player_units",
    columns: &[
        Column::text("puuid"),
        Column::text("match_id"),
        Column::text("character_id"),
        Column::array("items"),
        Column::text("tier"),
    ],
    primary_key: &["puuid", "match_id"],
};

pub static PLAYER_TRAITS: TableSchema = TableSchema {
    name: "player_traits",
    columns: &[
        Column::text("puuid"),
        Column::text("match_id"),
        Column::text("name"),
        Column::text("num_units"),
    ],
    primary_key: &["puuid", "match_id"],
};

impl TableSchema {
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|column| column.name)
    }

    /// Quoted, comma separated column list for SQL statements.
    pub fn column_list(&self) -> String {
        self.column_names()
            .map(quote_ident)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn create_table_sql(&self) -> String {
        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|column| {
                let sql_type = match column.kind {
                    ColumnKind::Text => "VARCHAR(255)",
                    ColumnKind::TextArray => "VARCHAR(255)[]",
                };
                format!("    {} {}", quote_ident(column.name), sql_type)
            })
            .collect();

        lines.push(format!(
            "    {} timestamp default current_timestamp",
            TIMESTAMP_COLUMN
        ));
        lines.push(format!(
            "    PRIMARY KEY ({})",
            self.primary_key
                .iter()
                .map(|key| quote_ident(key))
                .collect::<Vec<_>>()
                .join(", ")
        ));

        format!("CREATE TABLE {} (\n{}\n)", self.name, lines.join(",\n"))
    }
}

/// Leaves plain lowercase identifiers bare and double-quotes the rest, so
/// `companion.content_ID` keeps its dot and case.
pub fn quote_ident(name: &str) -> Cow<'_, str> {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if plain {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("\"{}\"", name.replace('"', "\"\"")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    Existing,
    Created,
    /// Absent and left absent because there was nothing to write.
    Missing,
}

impl TableState {
    pub fn is_loadable(self) -> bool {
        !matches!(self, TableState::Missing)
    }
}

/// Makes sure the fragment's destination table exists before rows are
/// staged. An empty fragment never creates a table.
pub fn ensure_table(session: &mut dyn Session, fragment: &Fragment) -> Result<TableState, StoreError> {
    let schema = fragment.table.schema();

    if session.table_exists(schema.name)? {
        return Ok(TableState::Existing);
    }

    if fragment.is_empty() {
        return Ok(TableState::Missing);
    }

    session.create_table(schema)?;
    info!(
        table = schema.name,
        columns = ?fragment.columns,
        "created table"
    );

    Ok(TableState::Created)
}
