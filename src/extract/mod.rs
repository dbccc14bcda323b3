//! Extraction
//!
//! The fetcher turns paginated API responses into one record list per run;
//! the sink persists those lists (and every later phase's output) as JSON
//! files that the next phase picks up.

mod fetcher;
pub mod sink;

pub use fetcher::{CountInfo, FetchOutcome, IncrementalFetcher};
