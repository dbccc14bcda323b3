//! Table store module
//!
//! Loads typed rows into DuckDB behind the [`TableStore`] trait, so the batch
//! upserter can be exercised against any store.

mod engine;
mod store;

pub use engine::DuckDbStore;
pub use store::{add_column_sql, create_table_sql, quote_ident, upsert_sql, TableStore};
