//! HTTP client with rate-limit backoff
//!
//! Handles:
//! - 429 responses: wait for `Retry-After` (or a default) and repeat the
//!   identical request, without a limit unless one is configured
//! - Every other non-2xx status and every transport error: fail immediately
//! - Optional client-side throttling via a token bucket
//! - JSON body parsing with decode errors reported as upstream failures

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::auth::{AuthConfig, Authenticator};
use crate::error::{Error, Result};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for relative request paths
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Wait applied when a 429 has no usable Retry-After header
    pub default_retry_after: Duration,
    /// Maximum consecutive 429s tolerated for one request (`None` = unbounded)
    pub max_rate_limit_retries: Option<u32>,
    /// Upper bound for a single Retry-After wait
    pub max_retry_after: Option<Duration>,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            default_retry_after: Duration::from_secs(60),
            max_rate_limit_retries: None,
            max_retry_after: None,
            rate_limit: None,
            default_headers: HashMap::new(),
            user_agent: format!("zendesk-etl/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the fallback wait for 429 responses without Retry-After
    pub fn default_retry_after(mut self, wait: Duration) -> Self {
        self.config.default_retry_after = wait;
        self
    }

    /// Cap the number of consecutive 429 retries
    pub fn max_rate_limit_retries(mut self, retries: Option<u32>) -> Self {
        self.config.max_rate_limit_retries = retries;
        self
    }

    /// Clamp each Retry-After wait
    pub fn max_retry_after(mut self, max: Option<Duration>) -> Self {
        self.config.max_retry_after = max;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// HTTP client with 429 backoff and optional throttling
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    authenticator: Option<Authenticator>,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            authenticator: None,
            rate_limiter,
        })
    }

    /// Create a client with authentication
    pub fn with_auth(config: HttpClientConfig, auth_config: AuthConfig) -> Result<Self> {
        let mut client = Self::with_config(config)?;
        client.authenticator = Some(Authenticator::new(auth_config));
        Ok(client)
    }

    /// Client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Make a GET request
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.request(Method::GET, url, &[]).await
    }

    /// Make a GET request with query parameters
    pub async fn get_with_query(&self, url: &str, query: &[(&str, String)]) -> Result<Response> {
        self.request(Method::GET, url, query).await
    }

    /// Make a request, retrying the identical request on 429
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Response> {
        let full_url = self.build_url(url);
        let mut rate_limited: u32 = 0;

        loop {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            let mut req = self.client.request(method.clone(), &full_url);

            for (key, value) in &self.config.default_headers {
                req = req.header(key.as_str(), value.as_str());
            }

            if !query.is_empty() {
                req = req.query(query);
            }

            if let Some(ref auth) = self.authenticator {
                req = auth.apply(req);
            }

            let response = req.send().await.map_err(Error::Http)?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                rate_limited += 1;
                let wait = self.retry_wait(&response);

                if let Some(max) = self.config.max_rate_limit_retries {
                    if rate_limited > max {
                        return Err(Error::RateLimited {
                            retry_after_seconds: wait.as_secs(),
                            attempts: rate_limited,
                        });
                    }
                }

                warn!(
                    "Rate limited (429) on {}, attempt {}, waiting {}s",
                    full_url,
                    rate_limited,
                    wait.as_secs()
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::http_status(status.as_u16(), truncate_body(body)));
            }

            debug!("Request succeeded: {} {}", method, full_url);
            return Ok(response);
        }
    }

    /// Make a GET request and parse the JSON response
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.get_with_query(url, query).await?;
        let body = response.text().await.map_err(Error::Http)?;
        serde_json::from_str(&body)
            .map_err(|e| Error::decode(format!("Invalid JSON from {url}: {e}")))
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Build full URL from path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }

    fn retry_wait(&self, response: &Response) -> Duration {
        let wait = extract_retry_after(response).unwrap_or(self.config.default_retry_after);
        match self.config.max_retry_after {
            Some(max) => wait.min(max),
            None => wait,
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_authenticator", &self.authenticator.is_some())
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Extract the Retry-After header as a wait duration (seconds form only)
fn extract_retry_after(response: &Response) -> Option<Duration> {
    let raw = response.headers().get("retry-after")?.to_str().ok()?.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    raw.parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| Duration::from_secs(secs.ceil() as u64))
}

fn truncate_body(mut body: String) -> String {
    const MAX: usize = 512;
    if body.len() > MAX {
        let mut cut = MAX;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}
