//! Common types used throughout the pipeline
//!
//! Shared type aliases and small enums used across extraction, loading and
//! orchestration.

use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// A semi-structured record exactly as the API returned it
pub type Record = serde_json::Map<String, JsonValue>;

/// A flattened record: column name to scalar (or JSON) value, in column order
pub type Row = serde_json::Map<String, JsonValue>;

/// Column tagging every row with the time it was loaded
pub const LOADED_AT_COLUMN: &str = "_loaded_at";

// ============================================================================
// Load Mode
// ============================================================================

/// How the batch upserter treats the target table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Load every row; the table may be truncated first
    #[default]
    Full,
    /// Only rows newer than the load watermark; the table is only ever grown
    Incremental,
}

impl LoadMode {
    pub fn from_flag(incremental: bool) -> Self {
        if incremental {
            LoadMode::Incremental
        } else {
            LoadMode::Full
        }
    }
}

impl std::fmt::Display for LoadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadMode::Full => f.write_str("full"),
            LoadMode::Incremental => f.write_str("incremental"),
        }
    }
}

// ============================================================================
// Resource Kind
// ============================================================================

/// Which endpoint family a resource is extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// `GET {resource}.json`, one page, no watermark
    Simple,
    /// `GET incremental/{resource}.json?start_time=T`, cursor-paginated
    #[default]
    Incremental,
}
