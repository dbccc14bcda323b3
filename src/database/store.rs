//! Table store abstraction and SQL text builders

use crate::error::Result;
use crate::schema::{Cell, ColumnSchema, TableSchema};

/// Minimal table store used by the batch upserter
///
/// Implementations must apply `upsert_batch` atomically: either every row of
/// the batch (and the truncation, if requested) is visible afterwards or
/// nothing is.
pub trait TableStore {
    /// Existing columns of `table`, or `None` when the table does not exist
    fn table_schema(&self, table: &str) -> Result<Option<TableSchema>>;

    fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.table_schema(table)?.is_some())
    }

    /// Create `table` with the given columns and primary key
    fn create_table(
        &mut self,
        table: &str,
        schema: &TableSchema,
        primary_key: &[String],
    ) -> Result<()>;

    /// Append columns to an existing table
    fn add_columns(&mut self, table: &str, columns: &[ColumnSchema]) -> Result<()>;

    /// Insert-or-update one batch in a single transaction
    ///
    /// With `truncate_first`, every existing row is removed in the same
    /// transaction before the batch is written; an empty batch then only
    /// truncates. Returns the number of rows written.
    fn upsert_batch(
        &mut self,
        table: &str,
        columns: &[String],
        primary_key: &[String],
        rows: &[Vec<Cell>],
        truncate_first: bool,
    ) -> Result<usize>;

    fn row_count(&self, table: &str) -> Result<u64>;
}

// ============================================================================
// SQL Builders
// ============================================================================

/// Double-quote an identifier, escaping embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `CREATE TABLE IF NOT EXISTS` statement
pub fn create_table_sql(table: &str, schema: &TableSchema, primary_key: &[String]) -> String {
    let mut defs: Vec<String> = schema
        .columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.column_type.sql_type()))
        .collect();

    let pk: Vec<String> = primary_key
        .iter()
        .filter_map(|k| schema.get(k))
        .map(|c| quote_ident(&c.name))
        .collect();
    if !pk.is_empty() {
        defs.push(format!("PRIMARY KEY ({})", pk.join(", ")));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(table),
        defs.join(", ")
    )
}

pub fn add_column_sql(table: &str, column: &ColumnSchema) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_ident(table),
        quote_ident(&column.name),
        column.column_type.sql_type()
    )
}

/// Single-row insert with `?` placeholders
///
/// With a primary key, conflicting rows are updated in place. When every
/// column is part of the key there is nothing to update and the conflict is
/// ignored.
pub fn upsert_sql(table: &str, columns: &[String], primary_key: &[String]) -> String {
    let col_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    let insert = format!(
        "INSERT INTO {} ({col_list}) VALUES ({placeholders})",
        quote_ident(table)
    );

    if primary_key.is_empty() {
        return insert;
    }

    let pk_list = primary_key
        .iter()
        .map(|k| quote_ident(k))
        .collect::<Vec<_>>()
        .join(", ");
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !primary_key.iter().any(|k| k.eq_ignore_ascii_case(c)))
        .map(|c| format!("{q} = EXCLUDED.{q}", q = quote_ident(c)))
        .collect();

    if updates.is_empty() {
        format!("{insert} ON CONFLICT ({pk_list}) DO NOTHING")
    } else {
        format!(
            "{insert} ON CONFLICT ({pk_list}) DO UPDATE SET {}",
            updates.join(", ")
        )
    }
}
