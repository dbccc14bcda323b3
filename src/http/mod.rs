//! HTTP client module
//!
//! Provides the HTTP client used by the fetcher.
//!
//! # Features
//!
//! - **Rate-limit backoff**: 429 responses wait for `Retry-After` and repeat the request
//! - **Throttling**: optional token bucket rate limiter using governor
//! - **Authentication**: integration with the auth module

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
