//! Watermark types
//!
//! A watermark is Unix seconds: everything updated at or before it has been
//! durably synced (or loaded). Sync and load progress are tracked separately.

use serde::{Deserialize, Serialize};

/// Which progress a watermark tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkKind {
    /// Extraction progress, keyed by resource name
    Sync,
    /// Table ingestion progress, keyed by table name
    Load,
}

impl WatermarkKind {
    /// File name prefix for this kind
    pub fn file_prefix(self) -> &'static str {
        match self {
            WatermarkKind::Sync => "last_sync_timestamp",
            WatermarkKind::Load => "last_load_timestamp",
        }
    }

    /// File name for a key
    pub fn file_name(self, key: &str) -> String {
        format!("{}_{key}.txt", self.file_prefix())
    }

    /// Recover kind and key from a file name
    pub fn parse_file_name(name: &str) -> Option<(Self, String)> {
        let stem = name.strip_suffix(".txt")?;
        [WatermarkKind::Sync, WatermarkKind::Load]
            .into_iter()
            .find_map(|kind| {
                stem.strip_prefix(kind.file_prefix())
                    .and_then(|rest| rest.strip_prefix('_'))
                    .filter(|key| !key.is_empty())
                    .map(|key| (kind, key.to_string()))
            })
    }
}

impl std::fmt::Display for WatermarkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatermarkKind::Sync => f.write_str("sync"),
            WatermarkKind::Load => f.write_str("load"),
        }
    }
}

/// A stored watermark
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub kind: WatermarkKind,
    pub key: String,
    pub value: i64,
}
