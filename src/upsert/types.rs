//! Load options and results

use crate::config::{LoadConfig, ResourceConfig};
use crate::error::DataShapeWarning;
use crate::schema::DEFAULT_SAMPLE_SIZE;
use crate::types::LoadMode;
use serde::Serialize;

/// Parameters of one load into one table
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Target table
    pub table: String,
    /// Primary key columns; empty means plain inserts
    pub primary_key: Vec<String>,
    pub mode: LoadMode,
    /// Rows per transaction
    pub batch_size: usize,
    /// Rows inspected for schema inference
    pub sample_size: usize,
    /// Columns always typed as text
    pub text_fields: Vec<String>,
    /// Row column holding the record's update time
    pub updated_at_column: Option<String>,
    /// Truncate an existing table on a full load
    pub replace_on_full: bool,
    /// Load watermark key; defaults to the table name
    pub watermark_key: Option<String>,
}

impl LoadOptions {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: Vec::new(),
            mode: LoadMode::Full,
            batch_size: 10_000,
            sample_size: DEFAULT_SAMPLE_SIZE,
            text_fields: crate::config::default_text_fields(),
            updated_at_column: Some("updated_at".to_string()),
            replace_on_full: true,
            watermark_key: None,
        }
    }

    /// Options for a configured resource
    pub fn for_resource(resource: &ResourceConfig, load: &LoadConfig, mode: LoadMode) -> Self {
        Self {
            table: resource.table_name().to_string(),
            primary_key: resource.primary_key.clone(),
            mode,
            batch_size: load.batch_size,
            sample_size: load.sample_size,
            text_fields: load.text_fields.clone(),
            updated_at_column: resource.updated_at_field.clone(),
            replace_on_full: load.replace_on_full,
            watermark_key: None,
        }
    }

    #[must_use]
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn updated_at_column(mut self, column: Option<&str>) -> Self {
        self.updated_at_column = column.map(ToString::to_string);
        self
    }

    #[must_use]
    pub fn replace_on_full(mut self, replace: bool) -> Self {
        self.replace_on_full = replace;
        self
    }

    /// Key of the load watermark
    pub fn watermark_key(&self) -> &str {
        self.watermark_key.as_deref().unwrap_or(&self.table)
    }
}

/// What a load did
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub table: String,
    /// Rows handed to the load
    pub rows_received: usize,
    /// Rows dropped by the load watermark filter
    pub rows_filtered: usize,
    /// Duplicate primary keys collapsed before writing
    pub rows_collapsed: usize,
    /// Rows written
    pub rows_loaded: usize,
    pub batches: usize,
    pub created_table: bool,
    pub truncated: bool,
    pub added_columns: Vec<String>,
    /// Load watermark before the run
    pub previous_watermark: Option<i64>,
    /// Load watermark persisted by the run, if any
    pub saved_watermark: Option<i64>,
    #[serde(skip)]
    pub warnings: Vec<DataShapeWarning>,
}
