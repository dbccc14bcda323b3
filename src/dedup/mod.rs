//! Record deduplication
//!
//! Incremental exports can return the same record more than once inside one
//! window (it was updated again while the export was running). Before
//! flattening, each key is collapsed to its most recently updated version.

mod deduplicator;

pub use deduplicator::{deduplicate, DedupOutcome};
