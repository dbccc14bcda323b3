//! Column type inference from flattened rows
//!
//! Each column is classified once from a sample, in this order:
//! forced types, designated text columns, the boolean rule, then the native
//! shape of the values. The resulting [`TableSchema`] drives table creation and
//! value coercion for every row, not only the sampled ones.

use super::types::{Cell, ColumnSchema, ColumnType, TableSchema};
use crate::config::default_text_fields;
use crate::error::{DataShapeWarning, Error, Result};
use crate::timestamp::{looks_like_datetime, parse_timestamp};
use crate::types::Row;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

/// Tokens accepted by the boolean rule (compared lowercase)
const BOOLEAN_TOKENS: &[&str] = &["true", "false", "1", "0", "1.0", "0.0"];

/// Default number of rows inspected per column
pub const DEFAULT_SAMPLE_SIZE: usize = 1000;

/// Column classifier
#[derive(Debug, Clone)]
pub struct SchemaInferrer {
    /// Columns always typed as text (lowercase)
    text_fields: HashSet<String>,
    /// Columns never typed as boolean (lowercase)
    no_boolean: HashSet<String>,
    /// Columns with a fixed type (lowercase)
    forced: HashMap<String, ColumnType>,
    /// Rows inspected
    sample_size: usize,
}

impl Default for SchemaInferrer {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaInferrer {
    /// Create an inferrer with the default text columns and sample size
    pub fn new() -> Self {
        Self {
            text_fields: lowercase_set(default_text_fields()),
            no_boolean: HashSet::new(),
            forced: HashMap::new(),
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }

    /// Replace the designated text columns
    #[must_use]
    pub fn with_text_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.text_fields = lowercase_set(fields);
        self
    }

    /// Set the number of rows inspected
    #[must_use]
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size.max(1);
        self
    }

    /// Exclude columns from the boolean rule (key columns)
    #[must_use]
    pub fn without_boolean_detection<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.no_boolean.extend(lowercase_set(fields));
        self
    }

    /// Fix the type of a column regardless of its values
    #[must_use]
    pub fn with_column_type(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        let name: String = name.into();
        self.forced.insert(name.to_ascii_lowercase(), column_type);
        self
    }

    /// Classify every column seen in `rows`
    ///
    /// Column order is the order of first appearance across all rows. Columns
    /// that only appear after the sample are typed from an empty sample.
    pub fn infer(&self, rows: &[Row]) -> InferredSchema {
        let mut order: Vec<&str> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for row in rows {
            for key in row.keys() {
                if seen.insert(key.as_str()) {
                    order.push(key.as_str());
                }
            }
        }

        let sample = &rows[..rows.len().min(self.sample_size)];
        let mut schema = TableSchema::default();
        let mut boolean_fields = BTreeSet::new();

        for name in order {
            let values: Vec<&Value> = sample
                .iter()
                .filter_map(|row| row.get(name))
                .filter(|v| !is_blank(v))
                .collect();
            let column_type = self.classify(name, &values);
            if column_type == ColumnType::Boolean {
                boolean_fields.insert(name.to_string());
            }
            schema.push(ColumnSchema::new(name, column_type));
        }

        debug!(
            "Inferred {} columns from {} sampled rows",
            schema.len(),
            sample.len()
        );
        InferredSchema {
            schema,
            boolean_fields,
        }
    }

    /// Classify one column from its non-null sampled values
    pub fn classify(&self, name: &str, values: &[&Value]) -> ColumnType {
        let lower = name.to_ascii_lowercase();

        if let Some(forced) = self.forced.get(&lower) {
            return *forced;
        }
        if self.text_fields.contains(&lower) {
            return ColumnType::Text;
        }
        if values.is_empty() {
            return ColumnType::Text;
        }
        if !self.no_boolean.contains(&lower) && is_boolean_column(values) {
            return ColumnType::Boolean;
        }

        values
            .iter()
            .map(|v| shape_of(v))
            .reduce(merge_shapes)
            .unwrap_or(ColumnType::Text)
    }
}

/// Inference result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredSchema {
    pub schema: TableSchema,
    pub boolean_fields: BTreeSet<String>,
}

/// Rows coerced to a schema
#[derive(Debug, Clone, PartialEq)]
pub struct TypedRows {
    pub schema: TableSchema,
    pub rows: Vec<Vec<Cell>>,
    pub boolean_fields: BTreeSet<String>,
    pub warnings: Vec<DataShapeWarning>,
}

/// Infer a schema from a sample and coerce every row to it
pub fn infer_schema(
    rows: &[Row],
    text_field_overrides: Option<&[String]>,
    sample_size: usize,
) -> Result<TypedRows> {
    let mut inferrer = SchemaInferrer::new().with_sample_size(sample_size);
    if let Some(fields) = text_field_overrides {
        inferrer = inferrer.with_text_fields(fields.iter().cloned());
    }

    let InferredSchema {
        schema,
        boolean_fields,
    } = inferrer.infer(rows);
    let (typed, warnings) = coerce_rows("rows", &schema, rows)?;

    Ok(TypedRows {
        schema,
        rows: typed,
        boolean_fields,
        warnings,
    })
}

/// Coerce every row to `schema`, failing on the first incompatible value
///
/// Booleans never fail: unrecognised values become NULL and are reported as a
/// warning per column.
pub fn coerce_rows(
    table: &str,
    schema: &TableSchema,
    rows: &[Row],
) -> Result<(Vec<Vec<Cell>>, Vec<DataShapeWarning>)> {
    let mut unknown_booleans: Vec<usize> = vec![0; schema.len()];
    let mut out = Vec::with_capacity(rows.len());

    for row in rows {
        let mut cells = Vec::with_capacity(schema.len());
        for (idx, column) in schema.columns.iter().enumerate() {
            let value = lookup(row, &column.name);
            let cell = match value {
                None => Cell::Null,
                Some(v) => coerce(v, column.column_type).ok_or_else(|| Error::SchemaDrift {
                    table: table.to_string(),
                    column: column.name.clone(),
                    expected: column.column_type.to_string(),
                    value: truncate(v.to_string()),
                })?,
            };
            if column.column_type == ColumnType::Boolean
                && cell.is_null()
                && value.is_some_and(|v| !is_blank(v))
            {
                unknown_booleans[idx] += 1;
            }
            cells.push(cell);
        }
        out.push(cells);
    }

    let warnings = schema
        .columns
        .iter()
        .zip(unknown_booleans)
        .filter(|(_, count)| *count > 0)
        .map(|(column, count)| {
            let warning = DataShapeWarning::new(
                &column.name,
                format!("{count} values not recognised as boolean, stored as NULL"),
            );
            warn!("{}: {}", table, warning);
            warning
        })
        .collect();

    Ok((out, warnings))
}

/// Convert a JSON value to a cell of the given type; `None` if incompatible
pub fn coerce(value: &Value, column_type: ColumnType) -> Option<Cell> {
    if is_blank(value) {
        // Empty strings are real text; everywhere else they mean "no value"
        return match (value, column_type) {
            (Value::String(s), ColumnType::Text) => Some(Cell::Text(s.clone())),
            _ => Some(Cell::Null),
        };
    }

    match column_type {
        ColumnType::Text => Some(Cell::Text(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        ColumnType::Boolean => Some(parse_bool(value).map_or(Cell::Null, Cell::Boolean)),
        ColumnType::Integer => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(integral))
                .map(Cell::Integer),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| parse_finite(s).and_then(integral))
                    .map(Cell::Integer)
            }
            _ => None,
        },
        ColumnType::Float => match value {
            Value::Number(n) => n.as_f64().map(Cell::Float),
            Value::String(s) => parse_finite(s.trim()).map(Cell::Float),
            _ => None,
        },
        ColumnType::Timestamp => parse_timestamp(value).map(Cell::Timestamp),
    }
}

/// Tri-state boolean parse
pub fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(true),
            Some(f) if f == 0.0 => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "1.0" => Some(true),
            "false" | "0" | "0.0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Null, empty string, empty array or empty object
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Every value is a boolean token and at most two truth values appear
///
/// Tokens are compared by meaning, so `"true"` and `"1"` count once.
fn is_boolean_column(values: &[&Value]) -> bool {
    let mut distinct: HashSet<bool> = HashSet::new();
    for value in values {
        let token = match value {
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.trim().to_ascii_lowercase(),
            _ => return false,
        };
        if !BOOLEAN_TOKENS.contains(&token.as_str()) {
            return false;
        }
        match parse_bool(value) {
            Some(b) => distinct.insert(b),
            None => return false,
        };
    }
    distinct.len() <= 2
}

/// Native type of a single value
fn shape_of(value: &Value) -> ColumnType {
    match value {
        Value::Bool(_) => ColumnType::Boolean,
        Value::Number(n) if n.is_i64() => ColumnType::Integer,
        Value::Number(_) => ColumnType::Float,
        Value::String(s) => {
            let s = s.trim();
            if s.parse::<i64>().is_ok() {
                ColumnType::Integer
            } else if parse_finite(s).is_some() {
                ColumnType::Float
            } else if looks_like_datetime(s) {
                ColumnType::Timestamp
            } else {
                ColumnType::Text
            }
        }
        _ => ColumnType::Text,
    }
}

/// Widen two shapes to one column type
fn merge_shapes(a: ColumnType, b: ColumnType) -> ColumnType {
    match (a, b) {
        (a, b) if a == b => a,
        (ColumnType::Integer, ColumnType::Float) | (ColumnType::Float, ColumnType::Integer) => {
            ColumnType::Float
        }
        _ => ColumnType::Text,
    }
}

/// Decimal float with at least one digit (rejects "inf", "NaN")
fn parse_finite(s: &str) -> Option<f64> {
    if !s.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn integral(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64).then_some(f as i64)
}

fn lookup<'a>(row: &'a Row, name: &str) -> Option<&'a Value> {
    row.get(name).or_else(|| {
        row.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

fn lowercase_set<I, S>(items: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items
        .into_iter()
        .map(|s| {
            let s: String = s.into();
            s.to_ascii_lowercase()
        })
        .collect()
}

fn truncate(mut s: String) -> String {
    if s.len() > 80 {
        let mut cut = 80;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str("...");
    }
    s
}
