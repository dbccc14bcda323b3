//! Watermark store implementation
//!
//! One small text file per (kind, key) holding a decimal Unix timestamp.
//! Writes go to a temp file that is renamed over the target, so a crash never
//! leaves a half-written watermark.

use super::types::{Watermark, WatermarkKind};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File-based watermark persistence
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    /// Directory holding the watermark files
    dir: PathBuf,
}

impl WatermarkStore {
    /// Create a store rooted at `dir` (created lazily on first save)
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the watermark files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing a watermark
    pub fn path(&self, kind: WatermarkKind, key: &str) -> PathBuf {
        self.dir.join(kind.file_name(key))
    }

    /// Read a watermark; `None` if it was never written
    ///
    /// Empty or unparseable files are treated as absent with a warning.
    pub async fn load(&self, kind: WatermarkKind, key: &str) -> Result<Option<i64>> {
        validate_key(key)?;
        let path = self.path(kind, key);

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::state(format!(
                    "Failed to read watermark {}: {e}",
                    path.display()
                )))
            }
        };

        let trimmed = contents.trim();
        if trimmed.is_empty() {
            warn!("Watermark file {} is empty, treating as unset", path.display());
            return Ok(None);
        }

        match parse_watermark(trimmed) {
            Some(value) => {
                debug!("Loaded {} watermark for {}: {}", kind, key, value);
                Ok(Some(value))
            }
            None => {
                warn!(
                    "Watermark file {} holds invalid value '{}', treating as unset",
                    path.display(),
                    trimmed
                );
                Ok(None)
            }
        }
    }

    /// Read a watermark, defaulting to 0
    pub async fn load_or_zero(&self, kind: WatermarkKind, key: &str) -> Result<i64> {
        Ok(self.load(kind, key).await?.unwrap_or(0))
    }

    /// Persist a watermark, replacing any previous value
    pub async fn save(&self, kind: WatermarkKind, key: &str, value: i64) -> Result<()> {
        validate_key(key)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::state(format!("Failed to create state dir: {e}")))?;

        // Write to temp file first, then rename for atomicity
        let path = self.path(kind, key);
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, value.to_string())
            .await
            .map_err(|e| Error::state(format!("Failed to write watermark file: {e}")))?;

        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| Error::state(format!("Failed to rename watermark file: {e}")))?;

        debug!("Saved {} watermark for {}: {}", kind, key, value);
        Ok(())
    }

    /// All readable watermarks in the directory, sorted by key then kind
    pub async fn list(&self) -> Result<Vec<Watermark>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::state(format!("Failed to list state dir: {e}"))),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::state(format!("Failed to list state dir: {e}")))?
        {
            let name = entry.file_name();
            let Some((kind, key)) = name.to_str().and_then(WatermarkKind::parse_file_name) else {
                continue;
            };
            if let Some(value) = self.load(kind, &key).await? {
                found.push(Watermark { kind, key, value });
            }
        }

        found.sort_by(|a, b| {
            a.key
                .cmp(&b.key)
                .then_with(|| a.kind.file_prefix().cmp(b.kind.file_prefix()))
        });
        Ok(found)
    }
}

/// Accept integers and decimal seconds (truncated)
fn parse_watermark(raw: &str) -> Option<i64> {
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.trunc() as i64)
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains(['/', '\\']) || key.contains("..") {
        return Err(Error::state(format!("Invalid watermark key '{key}'")));
    }
    Ok(())
}
