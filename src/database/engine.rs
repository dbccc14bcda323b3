//! DuckDB-backed table store
//!
//! The load target is a local DuckDB file (or an in-memory database in tests).
//! Table metadata comes from `information_schema`, so names are matched
//! case-insensitively the way DuckDB resolves identifiers.

use super::store::{add_column_sql, create_table_sql, quote_ident, upsert_sql, TableStore};
use crate::error::{Error, Result, ResultExt};
use crate::schema::{Cell, ColumnSchema, ColumnType, TableSchema};
use duckdb::types::{TimeUnit, Value};
use duckdb::{params, Connection};
use std::path::Path;
use tracing::debug;

/// Table store over a DuckDB connection
pub struct DuckDbStore {
    conn: Connection,
    /// Database location (for logging)
    location: String,
}

impl std::fmt::Debug for DuckDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbStore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl DuckDbStore {
    /// Open (or create) a database file, creating parent directories
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB database {}", path.display()))?;
        debug!("Opened DuckDB database {}", path.display());
        Ok(Self {
            conn,
            location: path.display().to_string(),
        })
    }

    /// In-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::store(format!("Failed to create DuckDB connection: {e}")))?;
        Ok(Self {
            conn,
            location: ":memory:".to_string(),
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Run a query returning a single text column
    pub fn query_strings(&self, sql: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let values = stmt
            .query_map([], |row| row.get::<_, Option<String>>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(values.into_iter().map(Option::unwrap_or_default).collect())
    }
}

impl TableStore for DuckDbStore {
    fn table_schema(&self, table: &str) -> Result<Option<TableSchema>> {
        let mut stmt = self.conn.prepare(
            "SELECT column_name, data_type FROM information_schema.columns \
             WHERE lower(table_name) = lower(?) ORDER BY ordinal_position",
        )?;
        let columns = stmt
            .query_map(params![table], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if columns.is_empty() {
            return Ok(None);
        }

        Ok(Some(TableSchema::new(
            columns
                .into_iter()
                .map(|(name, data_type)| {
                    ColumnSchema::new(name, ColumnType::from_sql_type(&data_type))
                })
                .collect(),
        )))
    }

    fn create_table(
        &mut self,
        table: &str,
        schema: &TableSchema,
        primary_key: &[String],
    ) -> Result<()> {
        if schema.is_empty() {
            return Err(Error::store(format!(
                "Cannot create table '{table}' without columns"
            )));
        }
        let sql = create_table_sql(table, schema, primary_key);
        debug!("{}", sql);
        self.conn
            .execute_batch(&sql)
            .with_context(|| format!("Failed to create table '{table}'"))
    }

    fn add_columns(&mut self, table: &str, columns: &[ColumnSchema]) -> Result<()> {
        for column in columns {
            let sql = add_column_sql(table, column);
            debug!("{}", sql);
            self.conn.execute_batch(&sql).with_context(|| {
                format!("Failed to add column '{}' to '{table}'", column.name)
            })?;
        }
        Ok(())
    }

    fn upsert_batch(
        &mut self,
        table: &str,
        columns: &[String],
        primary_key: &[String],
        rows: &[Vec<Cell>],
        truncate_first: bool,
    ) -> Result<usize> {
        if rows.is_empty() && !truncate_first {
            return Ok(0);
        }

        // Dropping the transaction on error rolls the batch back
        let tx = self.conn.transaction()?;
        if truncate_first {
            let sql = format!("TRUNCATE {}", quote_ident(table));
            debug!("{}", sql);
            tx.execute_batch(&sql)
                .with_context(|| format!("Failed to truncate '{table}'"))?;
        }
        if !rows.is_empty() {
            let sql = upsert_sql(table, columns, primary_key);
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                stmt.execute(duckdb::params_from_iter(row.iter().map(to_sql_value)))
                    .with_context(|| format!("Failed to upsert into '{table}'"))?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    fn row_count(&self, table: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT count(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

fn to_sql_value(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Integer(i) => Value::BigInt(*i),
        Cell::Boolean(b) => Value::Boolean(*b),
        Cell::Float(f) => Value::Double(*f),
        Cell::Timestamp(ts) => Value::Timestamp(TimeUnit::Microsecond, ts.timestamp_micros()),
        Cell::Text(s) => Value::Text(s.clone()),
    }
}
