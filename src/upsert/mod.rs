//! Checkpointed batch upserter
//!
//! # Overview
//!
//! Loads flattened rows into a table store:
//!
//! - **Full** loads create the table if needed and may truncate it first
//! - **Incremental** loads never drop data; missing columns are added and rows
//!   at or before the load watermark are skipped
//! - Rows are written in fixed-size batches, one transaction each, with
//!   insert-or-update on the primary key
//! - The load watermark only moves after every batch has committed

mod types;
mod upserter;

pub use types::{LoadOptions, LoadReport};
pub use upserter::BatchUpserter;
