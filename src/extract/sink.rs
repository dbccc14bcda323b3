//! Intermediate file sink
//!
//! Each phase writes one JSON array per run. Files embed a Unix timestamp in
//! their name (`{prefix}_{ts}.json` or `{prefix}_until_{ts}.json`); the latest
//! file is the one with the largest embedded timestamp.

use crate::error::{Error, Result, ResultExt};
use crate::types::Record;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

static FILE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:until_)?(\d+)\.json$").expect("valid file suffix regex"));

/// `{prefix}_{ts}.json`
pub fn timestamped_file_name(prefix: &str, ts: i64) -> String {
    format!("{prefix}_{ts}.json")
}

/// `{prefix}_until_{ts}.json`
pub fn until_file_name(prefix: &str, ts: i64) -> String {
    format!("{prefix}_until_{ts}.json")
}

/// Embedded timestamp of a file name belonging to `prefix`
pub fn embedded_timestamp(file_name: &str, prefix: &str) -> Option<i64> {
    let rest = file_name.strip_prefix(prefix)?.strip_prefix('_')?;
    FILE_SUFFIX
        .captures(rest)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Find the newest file for `prefix` in `dir`
pub async fn latest_file(dir: &Path, prefix: &str) -> Result<Option<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to list {}", dir.display())),
    };

    let mut best: Option<(i64, String, PathBuf)> = None;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(ts) = embedded_timestamp(name, prefix) else {
            continue;
        };
        let candidate = (ts, name.to_string(), entry.path());
        if best
            .as_ref()
            .map_or(true, |(bts, bname, _)| (ts, name) > (*bts, bname.as_str()))
        {
            best = Some(candidate);
        }
    }

    Ok(best.map(|(_, _, path)| path))
}

/// Like [`latest_file`], but missing files are an error
pub async fn require_latest_file(dir: &Path, prefix: &str) -> Result<PathBuf> {
    latest_file(dir, prefix)
        .await?
        .ok_or_else(|| Error::FileNotFound {
            path: dir.join(format!("{prefix}_*.json")).display().to_string(),
        })
}

/// Write records as a JSON array, atomically
pub async fn write_records(dir: &Path, file_name: &str, records: &[Record]) -> Result<PathBuf> {
    let contents = serde_json::to_vec_pretty(records)?;
    write_bytes(dir, file_name, &contents).await
}

/// Write any JSON value, atomically
pub async fn write_json(dir: &Path, file_name: &str, value: &Value) -> Result<PathBuf> {
    let contents = serde_json::to_vec_pretty(value)?;
    write_bytes(dir, file_name, &contents).await
}

async fn write_bytes(dir: &Path, file_name: &str, contents: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let path = dir.join(file_name);
    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, contents)
        .await
        .with_context(|| format!("Failed to write {}", temp_path.display()))?;
    tokio::fs::rename(&temp_path, &path)
        .await
        .with_context(|| format!("Failed to rename {}", temp_path.display()))?;

    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(path)
}

/// Read a JSON array of objects
pub async fn read_records(path: &Path) -> Result<Vec<Record>> {
    let value = read_json(path).await?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                other => Err(Error::store(format!(
                    "{} contains a non-object entry: {other}",
                    path.display()
                ))),
            })
            .collect(),
        _ => Err(Error::store(format!(
            "{} does not contain a JSON array",
            path.display()
        ))),
    }
}

/// Read any JSON file
pub async fn read_json(path: &Path) -> Result<Value> {
    let contents = match tokio::fs::read(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            })
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    serde_json::from_slice(&contents).with_context(|| format!("Invalid JSON in {}", path.display()))
}
