//! Paginated incremental fetcher
//!
//! Walks an incremental export from a start time, following `next_page`
//! cursors with a fixed pause between pages, until the server reports the end
//! of the stream or the next page would start past the caller's stop time.

use crate::config::PipelineConfig;
use crate::error::{DataShapeWarning, Error, Result};
use crate::http::{HttpClient, HttpClientConfig};
use crate::pagination::{next_page, IncrementalPage, NextPage};
use crate::timestamp::format_epoch;
use crate::types::Record;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Aggregated result of walking all pages
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Records from every page, in arrival order
    pub records: Vec<Record>,
    /// Authoritative end time (only set when the stream ended)
    pub end_time: Option<i64>,
    /// Server reported `end_of_stream`
    pub end_of_stream: bool,
    /// Stopped because the next page started past the stop time
    pub stopped_early: bool,
    /// Pages requested
    pub pages: usize,
    /// Shape problems absorbed while decoding
    pub warnings: Vec<DataShapeWarning>,
}

/// Result of a count probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountInfo {
    pub value: u64,
    pub refreshed_at: Option<String>,
}

/// Fetches records from list and incremental export endpoints
#[derive(Debug)]
pub struct IncrementalFetcher {
    client: HttpClient,
    page_delay: Duration,
}

impl IncrementalFetcher {
    /// Create a fetcher around an existing client
    pub fn new(client: HttpClient, page_delay: Duration) -> Self {
        Self { client, page_delay }
    }

    /// Build the client from the pipeline configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let mut builder = HttpClientConfig::builder()
            .base_url(config.api.base_url()?)
            .timeout(config.api.timeout())
            .default_retry_after(Duration::from_secs(config.fetch.default_retry_after_secs))
            .max_rate_limit_retries(config.fetch.max_rate_limit_retries)
            .max_retry_after(config.fetch.max_retry_after_secs.map(Duration::from_secs));
        if let Some(limit) = config.fetch.rate_limit {
            builder = builder.rate_limit(limit.into());
        }

        let client = HttpClient::with_auth(builder.build(), config.api.auth()?)?;
        Ok(Self::new(client, config.fetch.page_delay()))
    }

    /// Underlying HTTP client
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Export everything updated since `start_time`
    ///
    /// With `stop_time`, a continuation whose `start_time` exceeds it is not
    /// requested; the outcome then has `stopped_early` set and no end time.
    pub async fn fetch_incremental(
        &self,
        resource: &str,
        start_time: i64,
        stop_time: Option<i64>,
        include: Option<&str>,
    ) -> Result<FetchOutcome> {
        let mut query = vec![("start_time", start_time.to_string())];
        if let Some(include) = include {
            query.push(("include", include.to_string()));
        }

        info!(
            "Fetching incremental {} from {}{}",
            resource,
            format_epoch(start_time),
            stop_time.map_or_else(String::new, |s| format!(" until {}", format_epoch(s)))
        );

        let first = format!("incremental/{resource}.json");
        self.walk(resource, &first, &query, stop_time).await
    }

    /// Fetch a plain (non-incremental) listing
    pub async fn fetch_simple(&self, resource: &str) -> Result<FetchOutcome> {
        info!("Fetching {}", resource);
        let first = format!("{resource}.json");
        self.walk(resource, &first, &[], None).await
    }

    /// Read a `{"count": {"value": N, "refreshed_at": ...}}` endpoint
    pub async fn fetch_count(&self, path: &str) -> Result<CountInfo> {
        let body: Value = self.client.get_json(path, &[]).await?;
        let count = body
            .get("count")
            .ok_or_else(|| Error::decode(format!("No 'count' in response from {path}")))?;

        let value = count
            .get("value")
            .and_then(Value::as_u64)
            .or_else(|| count.as_u64())
            .ok_or_else(|| Error::decode(format!("Count from {path} is not a number")))?;
        let refreshed_at = count
            .get("refreshed_at")
            .and_then(Value::as_str)
            .map(ToString::to_string);

        Ok(CountInfo {
            value,
            refreshed_at,
        })
    }

    async fn walk(
        &self,
        resource: &str,
        first_url: &str,
        first_query: &[(&str, String)],
        stop_time: Option<i64>,
    ) -> Result<FetchOutcome> {
        let mut outcome = FetchOutcome::default();
        let mut body: Value = self.client.get_json(first_url, first_query).await?;

        loop {
            let page = IncrementalPage::from_value(resource, body)?;
            outcome.pages += 1;
            let step = next_page(&page, stop_time);

            let IncrementalPage {
                records, warnings, ..
            } = page;
            outcome.warnings.extend(warnings);
            outcome.records.extend(records);
            debug!(
                "{}: page {} done, {} records so far",
                resource,
                outcome.pages,
                outcome.records.len()
            );

            match step {
                NextPage::EndOfStream { end_time } => {
                    outcome.end_of_stream = true;
                    outcome.end_time = end_time;
                    break;
                }
                NextPage::StopBeforeTarget { next_start_time } => {
                    info!(
                        "{}: next page starts at {}, past the stop time; stopping",
                        resource,
                        format_epoch(next_start_time)
                    );
                    outcome.stopped_early = true;
                    break;
                }
                NextPage::Done => break,
                NextPage::Follow(url) => {
                    if !self.page_delay.is_zero() {
                        tokio::time::sleep(self.page_delay).await;
                    }
                    body = self.client.get_json(&url, &[]).await?;
                }
            }
        }

        info!(
            "Fetched {} {} records in {} pages",
            outcome.records.len(),
            resource,
            outcome.pages
        );
        Ok(outcome)
    }
}
