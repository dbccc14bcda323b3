//! Keep one version of each record

use crate::error::DataShapeWarning;
use crate::timestamp::parse_timestamp;
use crate::types::Record;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Result of deduplication
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupOutcome {
    /// One record per key, at the position the key was first seen
    pub records: Vec<Record>,
    /// Number of records dropped
    pub removed: usize,
    /// Fallbacks applied
    pub warnings: Vec<DataShapeWarning>,
}

/// Collapse records sharing `key_field` to the latest version
///
/// Versions are ordered by the parsed `updated_at_field`; equal timestamps keep
/// the first seen, and a version without a readable timestamp never replaces
/// one that has it. Without a usable timestamp field the first seen version
/// wins. If no record carries `key_field` at all, records pass through.
pub fn deduplicate(
    records: Vec<Record>,
    key_field: &str,
    updated_at_field: Option<&str>,
) -> DedupOutcome {
    let mut warnings = Vec::new();

    if !records.is_empty() && !records.iter().any(|r| has_value(r, key_field)) {
        let warning = DataShapeWarning::new(
            key_field,
            "key field absent from every record, skipping deduplication",
        );
        warn!("{}", warning);
        warnings.push(warning);
        return DedupOutcome {
            records,
            removed: 0,
            warnings,
        };
    }

    let ts_field = updated_at_field.filter(|field| {
        let present = records.iter().any(|r| has_value(r, field));
        if !present && !records.is_empty() {
            let warning = DataShapeWarning::new(
                *field,
                "timestamp field absent, keeping first seen version per key",
            );
            warn!("{}", warning);
            warnings.push(warning);
        }
        present
    });

    let total = records.len();
    let mut kept: Vec<(Record, Option<DateTime<Utc>>)> = Vec::with_capacity(total);
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(total);
    let mut keyless = 0usize;

    for record in records {
        let ts = ts_field.and_then(|f| record.get(f)).and_then(parse_timestamp);

        let Some(key) = record.get(key_field).and_then(key_string) else {
            keyless += 1;
            kept.push((record, ts));
            continue;
        };

        match positions.get(&key) {
            Some(&idx) => {
                let current = kept[idx].1;
                if is_newer(ts, current) {
                    kept[idx] = (record, ts);
                }
            }
            None => {
                positions.insert(key, kept.len());
                kept.push((record, ts));
            }
        }
    }

    if keyless > 0 {
        let warning = DataShapeWarning::new(
            key_field,
            format!("{keyless} records without a key kept as is"),
        );
        warn!("{}", warning);
        warnings.push(warning);
    }

    let removed = total - kept.len();
    if removed > 0 {
        debug!("Removed {} duplicate records by '{}'", removed, key_field);
    }

    DedupOutcome {
        records: kept.into_iter().map(|(record, _)| record).collect(),
        removed,
        warnings,
    }
}

fn is_newer(candidate: Option<DateTime<Utc>>, current: Option<DateTime<Utc>>) -> bool {
    match (candidate, current) {
        (Some(c), Some(cur)) => c > cur,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

fn has_value(record: &Record, field: &str) -> bool {
    record.get(field).is_some_and(|v| !v.is_null())
}

fn key_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
