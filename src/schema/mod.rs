//! Schema inference module
//!
//! Classifies flattened columns into a small set of SQL types and coerces row
//! values to them.
//!
//! # Features
//!
//! - **Text overrides**: free-text columns stay text even when they look numeric
//! - **Boolean detection**: two-valued true/false/1/0 columns become BOOLEAN
//! - **Native inference**: integers, floats and ISO-8601 timestamps
//! - **Tri-state booleans**: unrecognised values become NULL, never false
//! - **Drift detection**: values that do not fit their column fail the load

mod inference;
mod types;

pub use inference::{
    coerce, coerce_rows, infer_schema, parse_bool, InferredSchema, SchemaInferrer, TypedRows,
    DEFAULT_SAMPLE_SIZE,
};
pub use types::{Cell, ColumnSchema, ColumnType, TableSchema};

#[cfg(test)]
mod tests;
