//! Pipeline configuration
//!
//! The configuration is loaded from an optional YAML file, then overridden by
//! environment variables, then validated. It is passed explicitly to every
//! component; nothing reads the environment after [`PipelineConfig::apply_env`].
//!
//! ```yaml
//! api:
//!   subdomain: acme
//!   email: ops@acme.test
//! paths:
//!   data_dir: ./data
//!   state_dir: ./state
//!   database: ./warehouse.duckdb
//! fetch:
//!   page_delay_ms: 1000
//! load:
//!   batch_size: 10000
//! ```

use crate::auth::AuthConfig;
use crate::error::{Error, Result, ResultExt};
use crate::http::RateLimiterConfig;
use crate::types::EndpointKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable names recognised by [`PipelineConfig::apply_env`]
pub const ENV_SUBDOMAIN: &str = "ZENDESK_SUBDOMAIN";
pub const ENV_EMAIL: &str = "ZENDESK_EMAIL";
pub const ENV_API_TOKEN: &str = "ZENDESK_API_TOKEN";
pub const ENV_DATA_DIR: &str = "DATA_DIR";
pub const ENV_STATE_DIR: &str = "STATE_DIR";
pub const ENV_DATABASE_PATH: &str = "DATABASE_PATH";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Source API connection
    #[serde(default)]
    pub api: ApiConfig,

    /// Where intermediate files, watermarks and the database live
    #[serde(default)]
    pub paths: PathsConfig,

    /// Fetcher pacing and rate-limit behaviour
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Batch upserter settings
    #[serde(default)]
    pub load: LoadConfig,

    /// Resource catalogue, processed in this order
    #[serde(default = "default_resources")]
    pub resources: Vec<ResourceConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            paths: PathsConfig::default(),
            fetch: FetchConfig::default(),
            load: LoadConfig::default(),
            resources: default_resources(),
        }
    }
}

impl PipelineConfig {
    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        if config.resources.is_empty() {
            config.resources = default_resources();
        }
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml(&contents).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Override fields from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override fields from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_SUBDOMAIN) {
            self.api.subdomain = Some(v);
        }
        if let Some(v) = get(ENV_EMAIL) {
            self.api.email = Some(v);
        }
        if let Some(v) = get(ENV_API_TOKEN) {
            self.api.api_token = Some(v);
        }
        if let Some(v) = get(ENV_DATA_DIR) {
            self.paths.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_STATE_DIR) {
            self.paths.state_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_DATABASE_PATH) {
            self.paths.database = PathBuf::from(v);
        }
    }

    /// Check settings that every phase relies on
    pub fn validate(&self) -> Result<()> {
        if self.load.batch_size == 0 {
            return Err(Error::invalid_value("load.batch_size", "must be positive"));
        }
        if self.load.sample_size == 0 {
            return Err(Error::invalid_value("load.sample_size", "must be positive"));
        }
        if self.resources.is_empty() {
            return Err(Error::missing_field("resources"));
        }

        let mut seen = HashSet::new();
        for resource in &self.resources {
            if resource.name.trim().is_empty() {
                return Err(Error::missing_field("resources[].name"));
            }
            if !seen.insert(resource.name.as_str()) {
                return Err(Error::invalid_value(
                    "resources",
                    format!("duplicate resource '{}'", resource.name),
                ));
            }
        }

        for resource in &self.resources {
            for required in &resource.requires {
                if !seen.contains(required.as_str()) {
                    return Err(Error::invalid_value(
                        format!("resources.{}.requires", resource.name),
                        format!("unknown resource '{required}'"),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Check settings needed before talking to the API
    pub fn validate_for_extract(&self) -> Result<()> {
        self.api.base_url()?;
        self.api.auth()?;
        Ok(())
    }

    /// Look up a resource by name
    pub fn resource(&self, name: &str) -> Option<&ResourceConfig> {
        self.resources.iter().find(|r| r.name == name)
    }
}

// ============================================================================
// API
// ============================================================================

/// Source API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Account subdomain (`{subdomain}.zendesk.com`)
    #[serde(default)]
    pub subdomain: Option<String>,

    /// Agent email used for token authentication
    #[serde(default)]
    pub email: Option<String>,

    /// API token
    #[serde(default)]
    pub api_token: Option<String>,

    /// Full base URL override (tests, proxies)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            subdomain: None,
            email: None,
            api_token: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

impl ApiConfig {
    /// Base URL all endpoint paths are joined to
    pub fn base_url(&self) -> Result<String> {
        if let Some(ref url) = self.base_url {
            url::Url::parse(url).map_err(|e| Error::invalid_value("api.base_url", e.to_string()))?;
            return Ok(url.trim_end_matches('/').to_string());
        }
        match self.subdomain.as_deref().map(str::trim) {
            Some(sub) if !sub.is_empty() => Ok(format!("https://{sub}.zendesk.com/api/v2")),
            _ => Err(Error::missing_field("api.subdomain")),
        }
    }

    /// Authentication derived from email and token
    pub fn auth(&self) -> Result<AuthConfig> {
        let email = non_empty(self.email.as_deref()).ok_or_else(|| Error::missing_field("api.email"))?;
        let token =
            non_empty(self.api_token.as_deref()).ok_or_else(|| Error::missing_field("api.api_token"))?;
        Ok(AuthConfig::ApiToken {
            email: email.to_string(),
            token: token.to_string(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ============================================================================
// Paths
// ============================================================================

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of raw and transformed intermediate files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory holding watermark files
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// DuckDB database file
    #[serde(default = "default_database")]
    pub database: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            state_dir: default_state_dir(),
            database: default_database(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

fn default_database() -> PathBuf {
    PathBuf::from("zendesk.duckdb")
}

impl PathsConfig {
    /// Directory for a resource's raw extraction files
    pub fn raw_dir(&self, resource: &str) -> PathBuf {
        self.data_dir.join("raw").join(resource)
    }

    /// Directory for a resource's flattened files
    pub fn transformed_dir(&self, resource: &str) -> PathBuf {
        self.data_dir.join("transformed").join(resource)
    }
}

// ============================================================================
// Fetch
// ============================================================================

/// Fetcher behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Pause between consecutive pages, in milliseconds
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Wait used when a 429 carries no usable Retry-After header
    #[serde(default = "default_retry_after_secs")]
    pub default_retry_after_secs: u64,

    /// Give up after this many consecutive 429s for one request (unbounded if unset)
    #[serde(default)]
    pub max_rate_limit_retries: Option<u32>,

    /// Clamp each individual Retry-After wait to this many seconds
    #[serde(default)]
    pub max_retry_after_secs: Option<u64>,

    /// Optional client-side throttle applied before every request
    #[serde(default)]
    pub rate_limit: Option<RateLimitDef>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_delay_ms: default_page_delay_ms(),
            default_retry_after_secs: default_retry_after_secs(),
            max_rate_limit_retries: None,
            max_retry_after_secs: None,
            rate_limit: None,
        }
    }
}

fn default_page_delay_ms() -> u64 {
    1000
}

fn default_retry_after_secs() -> u64 {
    60
}

impl FetchConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

/// Client-side token bucket settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitDef {
    pub requests_per_second: u32,
    #[serde(default)]
    pub burst_size: Option<u32>,
}

impl From<RateLimitDef> for RateLimiterConfig {
    fn from(def: RateLimitDef) -> Self {
        RateLimiterConfig::new(
            def.requests_per_second,
            def.burst_size.unwrap_or(def.requests_per_second),
        )
    }
}

// ============================================================================
// Load
// ============================================================================

/// Batch upserter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Rows per transaction
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Rows inspected for schema inference
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Columns always typed as text
    #[serde(default = "default_text_fields")]
    pub text_fields: Vec<String>,

    /// Truncate existing tables before a full load
    #[serde(default = "default_true")]
    pub replace_on_full: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            sample_size: default_sample_size(),
            text_fields: default_text_fields(),
            replace_on_full: true,
        }
    }
}

fn default_batch_size() -> usize {
    10_000
}

fn default_sample_size() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

/// Columns whose content is free text even when it looks numeric
pub fn default_text_fields() -> Vec<String> {
    [
        "description",
        "title",
        "type",
        "name",
        "email",
        "subject",
        "custom_field_options",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

// ============================================================================
// Resources
// ============================================================================

/// One extractable, loadable resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// API resource name (`tickets`, `users`, ...)
    pub name: String,

    /// Target table; defaults to the resource name
    #[serde(default)]
    pub table: Option<String>,

    /// Endpoint family
    #[serde(default)]
    pub endpoint: EndpointKind,

    /// Sideload parameter for the incremental endpoint
    #[serde(default)]
    pub include: Option<String>,

    /// Table primary key columns (empty for append-only tables)
    #[serde(default)]
    pub primary_key: Vec<String>,

    /// Raw record field used for deduplication
    #[serde(default = "default_dedup_key")]
    pub dedup_key: String,

    /// Field carrying the record's last update time
    #[serde(default = "default_updated_at")]
    pub updated_at_field: Option<String>,

    /// Stop incremental export at Monday 00:00 UTC of the current week
    #[serde(default)]
    pub stop_at_week_start: bool,

    /// Count endpoint logged before extraction (e.g. `tickets/count.json`)
    #[serde(default)]
    pub count_endpoint: Option<String>,

    /// Resources whose transform must complete first in the same run
    #[serde(default)]
    pub requires: Vec<String>,
}

fn default_dedup_key() -> String {
    "id".to_string()
}

fn default_updated_at() -> Option<String> {
    Some("updated_at".to_string())
}

impl ResourceConfig {
    /// Create a resource with default settings
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            endpoint: EndpointKind::Incremental,
            include: None,
            primary_key: Vec::new(),
            dedup_key: default_dedup_key(),
            updated_at_field: default_updated_at(),
            stop_at_week_start: false,
            count_endpoint: None,
            requires: Vec::new(),
        }
    }

    /// Target table name
    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }

    /// Whether extraction tracks a sync watermark
    pub fn is_incremental(&self) -> bool {
        self.endpoint == EndpointKind::Incremental
    }
}

/// The built-in resource catalogue
pub fn default_resources() -> Vec<ResourceConfig> {
    vec![
        ResourceConfig {
            endpoint: EndpointKind::Simple,
            primary_key: vec!["id".to_string()],
            ..ResourceConfig::new("ticket_fields")
        },
        ResourceConfig {
            primary_key: vec!["organization_id".to_string()],
            ..ResourceConfig::new("organizations")
        },
        ResourceConfig {
            primary_key: vec!["user_id".to_string(), crate::types::LOADED_AT_COLUMN.to_string()],
            ..ResourceConfig::new("users")
        },
        ResourceConfig {
            include: Some("users".to_string()),
            primary_key: vec!["ticket_id".to_string()],
            stop_at_week_start: true,
            count_endpoint: Some("tickets/count.json".to_string()),
            requires: vec!["ticket_fields".to_string()],
            ..ResourceConfig::new("tickets")
        },
    ]
}
