//! Schema types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse column type shared by inference and the table store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Boolean,
    Float,
    Timestamp,
    Text,
}

impl ColumnType {
    /// SQL type used when creating the column
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Integer => "BIGINT",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Float => "DOUBLE",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Text => "TEXT",
        }
    }

    /// Map a type name reported by the store back to a column type
    pub fn from_sql_type(sql: &str) -> ColumnType {
        let upper = sql.trim().to_ascii_uppercase();
        let base = upper.split('(').next().unwrap_or_default().trim();
        match base {
            "BIGINT" | "INTEGER" | "INT" | "INT4" | "INT8" | "SMALLINT" | "TINYINT" | "HUGEINT"
            | "UBIGINT" | "UINTEGER" | "USMALLINT" | "UTINYINT" => ColumnType::Integer,
            "BOOLEAN" | "BOOL" => ColumnType::Boolean,
            "DOUBLE" | "FLOAT" | "REAL" | "FLOAT4" | "FLOAT8" | "DECIMAL" | "NUMERIC" => {
                ColumnType::Float
            }
            b if b.starts_with("TIMESTAMP") || b == "DATE" || b == "DATETIME" => {
                ColumnType::Timestamp
            }
            _ => ColumnType::Text,
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sql_type())
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Ordered column list of a table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(columns: Vec<ColumnSchema>) -> Self {
        Self { columns }
    }

    /// Find a column, ignoring ASCII case
    pub fn get(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Append a column if no column of that name exists
    pub fn push(&mut self, column: ColumnSchema) {
        if !self.contains(&column.name) {
            self.columns.push(column);
        }
    }

    /// Columns of `self` that `existing` lacks (case-insensitive)
    pub fn missing_from(&self, existing: &TableSchema) -> Vec<ColumnSchema> {
        self.columns
            .iter()
            .filter(|c| !existing.contains(&c.name))
            .cloned()
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A value coerced to its column's type
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Boolean(bool),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}
