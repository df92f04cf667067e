//! Column layout and text rendering for flattened rows.
//!
//! Flattened rows name their fields in whatever order the payload produced
//! them. Normalizing lays the fields out in the destination table's column
//! order and renders every value as text, with list values written as array
//! literals (`{a,b,c}`).

use std::fmt::Display;

use crate::error::SchemaError;
use crate::model::Scalar;
use crate::schema::TableName;

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl Field {
    pub fn render(&self) -> String {
        match self {
            Field::Scalar(value) => value.to_string(),
            Field::List(values) => array_literal(values.as_slice()),
        }
    }
}

impl From<Scalar> for Field {
    fn from(value: Scalar) -> Self {
        Field::Scalar(value)
    }
}

impl From<&Scalar> for Field {
    fn from(value: &Scalar) -> Self {
        Field::Scalar(value.clone())
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Scalar(Scalar::from(value))
    }
}

/// A flattened row destined for one table.
pub trait Row {
    const TABLE: TableName;

    fn fields(&self) -> Vec<(&'static str, Field)>;
}

/// Rows for one table, laid out in that table's column order and rendered
/// as text.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub table: TableName,
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

impl Fragment {
    pub fn empty(table: TableName) -> Self {
        Self {
            table,
            columns: table.schema().column_names().collect(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of the primary key columns for each row, in row order.
    pub fn keys(&self) -> Vec<Vec<&str>> {
        let positions: Vec<usize> = self
            .table
            .schema()
            .primary_key
            .iter()
            .filter_map(|key| self.columns.iter().position(|column| column == key))
            .collect();

        self.rows
            .iter()
            .map(|row| positions.iter().map(|&idx| row[idx].as_str()).collect())
            .collect()
    }
}

/// Renders a list the way the store parses array input: elements joined
/// with commas inside braces. Elements are not escaped, so an element
/// containing `,` or `}` produces a different array on load.
pub fn array_literal<T: Display>(items: &[T]) -> String {
    let joined = items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("{{{}}}", joined)
}

/// Lays one row's fields out in `table`'s column order.
pub fn normalize_record(
    table: TableName,
    fields: &[(&'static str, Field)],
) -> Result<Vec<String>, SchemaError> {
    table
        .schema()
        .column_names()
        .map(|column| {
            fields
                .iter()
                .find(|(name, _)| *name == column)
                .map(|(_, field)| field.render())
                .ok_or(SchemaError::MissingColumn { table, column })
        })
        .collect()
}

pub fn normalize<R: Row>(rows: &[R]) -> Result<Fragment, SchemaError> {
    let mut fragment = Fragment::empty(R::TABLE);
    fragment.rows = rows
        .iter()
        .map(|row| normalize_record(R::TABLE, &row.fields()))
        .collect::<Result<_, _>>()?;
    Ok(fragment)
}
