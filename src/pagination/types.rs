//! Pagination types
//!
//! An incremental export page looks like:
//!
//! ```json
//! {
//!   "tickets": [ ... ],
//!   "end_of_stream": false,
//!   "end_time": 1704067200,
//!   "next_page": "https://acme.zendesk.com/api/v2/incremental/tickets.json?start_time=1704067200",
//!   "count": 1000
//! }
//! ```

use crate::error::{DataShapeWarning, Error, Result};
use crate::types::Record;
use serde_json::Value;

/// One decoded page of an incremental (or simple) listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncrementalPage {
    /// Records found under the resource key
    pub records: Vec<Record>,
    /// Server says there is nothing more to export
    pub end_of_stream: bool,
    /// Server-reported export position for this page
    pub end_time: Option<i64>,
    /// Continuation URL
    pub next_page: Option<String>,
    /// Shape problems encountered while decoding
    pub warnings: Vec<DataShapeWarning>,
}

impl IncrementalPage {
    /// Decode a response body, taking records from the `resource` key
    pub fn from_value(resource: &str, body: Value) -> Result<Self> {
        let mut body = match body {
            Value::Object(map) => map,
            other => {
                return Err(Error::decode(format!(
                    "Expected a JSON object for '{resource}', got {}",
                    json_type_name(&other)
                )))
            }
        };

        let mut warnings = Vec::new();
        let records = match body.remove(resource) {
            Some(Value::Array(items)) => {
                let total = items.len();
                let records: Vec<Record> = items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(map) => Some(map),
                        _ => None,
                    })
                    .collect();
                if records.len() < total {
                    warnings.push(DataShapeWarning::new(
                        resource,
                        format!("skipped {} non-object entries", total - records.len()),
                    ));
                }
                records
            }
            Some(Value::Null) | None => {
                warnings.push(DataShapeWarning::new(
                    resource,
                    "response has no record list, treating page as empty",
                ));
                Vec::new()
            }
            Some(other) => {
                return Err(Error::decode(format!(
                    "Expected '{resource}' to be an array, got {}",
                    json_type_name(&other)
                )))
            }
        };

        let end_of_stream = body
            .get("end_of_stream")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let end_time = body.get("end_time").and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        });
        let next_page = body
            .get("next_page")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string);

        Ok(Self {
            records,
            end_of_stream,
            end_time,
            next_page,
            warnings,
        })
    }
}

/// What the fetcher should do after a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Request this URL next
    Follow(String),
    /// Export finished; `end_time` is authoritative
    EndOfStream { end_time: Option<i64> },
    /// The next page starts after the stop time; do not request it
    StopBeforeTarget { next_start_time: i64 },
    /// No continuation and no end-of-stream marker
    Done,
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
