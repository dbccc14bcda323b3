//! Ticket field id to label mapping

use crate::error::{Error, Result};
use crate::types::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// File prefix of persisted field maps (`field_map_{ts}.json`)
pub const FIELD_MAP_PREFIX: &str = "field_map";

/// Custom field id (as a string) to field title
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap {
    labels: BTreeMap<String, String>,
}

impl FieldMap {
    /// Build from raw ticket field records; fields without id or title are skipped
    pub fn from_records(records: &[Record]) -> Self {
        let labels = records
            .iter()
            .filter_map(|field| {
                let id = id_key(field.get("id")?)?;
                let title = field.get("title")?.as_str()?;
                Some((id, title.to_string()))
            })
            .collect();
        Self { labels }
    }

    /// Label for a field id
    pub fn label(&self, id: &Value) -> Option<&str> {
        id_key(id).and_then(|key| self.labels.get(&key).map(String::as_str))
    }

    pub fn insert(&mut self, id: impl Into<String>, label: impl Into<String>) {
        self.labels.insert(id.into(), label.into());
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.labels
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }

    /// Parse a persisted map
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::store(format!("Invalid field map: {e}")))
    }
}

/// Ids are stored as strings; numeric and string ids are interchangeable
fn id_key(id: &Value) -> Option<String> {
    match id {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
