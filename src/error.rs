//! Error types for the ETL pipeline
//!
//! Every fallible API returns `Result<T, Error>`. Each error variant belongs to
//! exactly one [`ErrorKind`], which is what the orchestrator and the CLI use to
//! decide whether a resource failed and how to report it.

use thiserror::Error;

/// Coarse classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Required configuration is missing or invalid; raised before any I/O
    ConfigMissing,
    /// The upstream API kept answering 429 past the configured patience
    UpstreamRateLimited,
    /// Non-429 HTTP error, transport failure or malformed response body
    UpstreamFatal,
    /// Unexpected record shape; normally absorbed as a warning
    DataShapeWarning,
    /// Table store, watermark file or intermediate file failure
    StoreError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::ConfigMissing => "config_missing",
            ErrorKind::UpstreamRateLimited => "upstream_rate_limited",
            ErrorKind::UpstreamFatal => "upstream_fatal",
            ErrorKind::DataShapeWarning => "data_shape_warning",
            ErrorKind::StoreError => "store_error",
        };
        f.write_str(name)
    }
}

/// The main error type for the pipeline
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // ============================================================================
    // Upstream Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limited {attempts} times, last retry-after {retry_after_seconds}s")]
    RateLimited {
        retry_after_seconds: u64,
        attempts: u32,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    // ============================================================================
    // Data Shape Errors
    // ============================================================================
    #[error("Unexpected data shape in '{field}': {message}")]
    DataShape { field: String, message: String },

    #[error("Column '{column}' of '{table}' is {expected} but got incompatible value {value}")]
    SchemaDrift {
        table: String,
        column: String,
        expected: String,
        value: String,
    },

    // ============================================================================
    // Store Errors
    // ============================================================================
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Watermark error: {message}")]
    State { message: String },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ============================================================================
    // Wrapped Errors
    // ============================================================================
    #[error("{message}: {source}")]
    Context {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a data shape error
    pub fn data_shape(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataShape {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a watermark state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config { .. }
            | Error::MissingConfigField { .. }
            | Error::InvalidConfigValue { .. }
            | Error::YamlParse(_) => ErrorKind::ConfigMissing,
            Error::RateLimited { .. } => ErrorKind::UpstreamRateLimited,
            Error::Http(_) | Error::HttpStatus { .. } | Error::InvalidUrl(_) | Error::Decode { .. } => {
                ErrorKind::UpstreamFatal
            }
            Error::DataShape { .. } => ErrorKind::DataShapeWarning,
            Error::SchemaDrift { .. }
            | Error::Database(_)
            | Error::Store { .. }
            | Error::State { .. }
            | Error::JsonParse(_)
            | Error::Io(_)
            | Error::FileNotFound { .. } => ErrorKind::StoreError,
            Error::Context { source, .. } => source.kind(),
        }
    }
}

/// A data-shape problem that was absorbed with a fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataShapeWarning {
    /// Field (or resource) the warning is about
    pub field: String,
    /// What was wrong and which fallback was applied
    pub message: String,
}

impl DataShapeWarning {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DataShapeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result type alias for the pipeline
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Context {
            message: message.into(),
            source: Box::new(e.into()),
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| Error::Context {
            message: f(),
            source: Box::new(e.into()),
        })
    }
}
