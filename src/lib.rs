// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # Zendesk ETL
//!
//! Incremental extract, transform and idempotent load of help-desk resources
//! into an embedded SQL table store.
//!
//! ## Features
//!
//! - **Incremental Sync**: Per-resource sync watermarks drive the export cursor
//! - **Rate-Limit Aware Fetching**: `Retry-After` honoured, pages paced
//! - **Deduplication**: Latest version of each record by `updated_at`
//! - **Schema Inference**: Column types from sampled rows, additive evolution
//! - **Idempotent Load**: Checkpointed batch upserts with a load watermark
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use zendesk_etl::config::PipelineConfig;
//! use zendesk_etl::engine::{Pipeline, RunOptions};
//!
//! #[tokio::main]
//! async fn main() -> zendesk_etl::Result<()> {
//!     let mut config = PipelineConfig::from_file("etl.yaml")?;
//!     config.apply_env();
//!
//!     let report = Pipeline::new(config)?.run(&RunOptions::default()).await?;
//!     assert!(report.is_success());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Pipeline (engine)                        │
//! │        extract all  →  transform all  →  load all                │
//! └──────────────────────────────────────────────────────────────────┘
//!                                 │
//! ┌────────────┬──────────────┬───┴──────────┬────────────┬──────────┐
//! │  Extract   │  Transform   │   Schema     │  Upsert    │  State   │
//! ├────────────┼──────────────┼──────────────┼────────────┼──────────┤
//! │ HTTP/Auth  │ Dedup        │ Inference    │ Batches    │ Sync WM  │
//! │ Cursor     │ Flatten      │ Coercion     │ DuckDB     │ Load WM  │
//! │ Files      │ Field map    │              │            │          │
//! └────────────┴──────────────┴──────────────┴────────────┴──────────┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types and classification
pub mod error;

/// Common types and type aliases
pub mod types;

/// Timestamp parsing and formatting
pub mod timestamp;

/// Configuration loading and validation
pub mod config;

/// Authentication
pub mod auth;

/// HTTP client with rate-limit handling
pub mod http;

/// Incremental export cursor handling
pub mod pagination;

/// Paginated fetching and intermediate files
pub mod extract;

/// Watermark persistence
pub mod state;

/// Record deduplication
pub mod dedup;

/// Schema inference and value coercion
pub mod schema;

/// Table store backed by DuckDB
pub mod database;

/// Checkpointed batch upserts
pub mod upsert;

/// Per-resource flattening
pub mod transform;

/// Phase orchestration
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, ErrorKind, Result};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
