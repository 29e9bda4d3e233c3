//! Flattens snapshots into spreadsheet rows
//!
//! Every snapshot field becomes a column. `market_cap` and `current_price` are coerced to
//! floats in place and a `volume` column is derived from `total_volume`.

use serde_json::Value;
use thiserror::Error;

use crate::market::Snapshot;

/// Columns coerced to floating point in place
const FLOAT_COLUMNS: [&str; 2] = ["market_cap", "current_price"];

/// Source and target columns for the derived trading volume
const VOLUME_SOURCE: &str = "total_volume";
const VOLUME_COLUMN: &str = "volume";

/// Errors raised while reshaping snapshots
///
/// These are fatal for the run.
#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    /// A column required for coercion is absent
    #[error("Missing column '{0}'")]
    MissingColumn(String),

    /// A value could not be converted to a float
    #[error("Could not convert {value} in column '{column}' to float")]
    NotNumeric { column: String, value: String },
}

/// A single spreadsheet cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Cell {
    /// Maps a JSON value onto a cell; nested values keep their JSON text
    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Empty,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Empty),
            Value::String(s) => Cell::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => Cell::Text(value.to_string()),
        }
    }

    /// Float coercion; empty stays empty, numeric text is parsed
    fn to_float(&self, column: &str) -> Result<Cell, TransformError> {
        match self {
            Cell::Empty => Ok(Cell::Empty),
            Cell::Number(n) => Ok(Cell::Number(*n)),
            Cell::Bool(b) => Ok(Cell::Number(if *b { 1.0 } else { 0.0 })),
            Cell::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(Cell::Number)
                .map_err(|_| TransformError::NotNumeric {
                    column: column.to_string(),
                    value: format!("{:?}", s),
                }),
        }
    }
}

/// Column names plus rows of cells, one row per snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at `row` in the named column
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col)
    }

    /// Replaces every cell of `column` with its float coercion
    fn coerce_column(&mut self, column: &str) -> Result<(), TransformError> {
        let col = self
            .column_index(column)
            .ok_or_else(|| TransformError::MissingColumn(column.to_string()))?;

        for row in &mut self.rows {
            row[col] = row[col].to_float(column)?;
        }
        Ok(())
    }

    /// Writes the float coercion of `source` into `target`, appending it if needed
    fn derive_float_column(&mut self, source: &str, target: &str) -> Result<(), TransformError> {
        let src = self
            .column_index(source)
            .ok_or_else(|| TransformError::MissingColumn(source.to_string()))?;

        let values = self
            .rows
            .iter()
            .map(|row| row[src].to_float(source))
            .collect::<Result<Vec<_>, _>>()?;

        let dst = match self.column_index(target) {
            Some(dst) => dst,
            None => {
                self.columns.push(target.to_string());
                for row in &mut self.rows {
                    row.push(Cell::Empty);
                }
                self.columns.len() - 1
            }
        };

        for (row, value) in self.rows.iter_mut().zip(values) {
            row[dst] = value;
        }
        Ok(())
    }
}

/// Reshapes snapshots into a table with normalized numeric columns
///
/// Columns are the union of all snapshot keys in first-seen order; a snapshot lacking a key
/// gets an empty cell. An empty input yields an empty table and no coercion is attempted.
pub fn transform(snapshots: &[Snapshot]) -> Result<Table, TransformError> {
    let mut table = Table::default();
    if snapshots.is_empty() {
        return Ok(table);
    }

    for snapshot in snapshots {
        for key in snapshot.keys() {
            if table.column_index(key).is_none() {
                table.columns.push(key.clone());
            }
        }
    }

    table.rows = snapshots
        .iter()
        .map(|snapshot| {
            table
                .columns
                .iter()
                .map(|column| snapshot.get(column).map(Cell::from_json).unwrap_or(Cell::Empty))
                .collect()
        })
        .collect();

    for column in FLOAT_COLUMNS {
        table.coerce_column(column)?;
    }
    table.derive_float_column(VOLUME_SOURCE, VOLUME_COLUMN)?;

    Ok(table)
}
