//! HTTP transport module
//!
//! Provides the transport used by the pagination engine: a reqwest client
//! with bounded retry, backoff and optional rate limiting, behind the
//! [`Transport`] trait.
//!
//! # Features
//!
//! - **Automatic Retries**: allowlisted status codes, timeouts and connection errors
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Backoff Strategies**: Constant, linear, and exponential backoff
//! - **Authentication**: static `access_key` header on every request
//! - **Dedicated pools**: a fresh connection pool per concurrent fetch

mod client;
mod rate_limit;
mod transport;

pub use client::{
    default_user_agent, HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig,
    ACCESS_KEY_HEADER, DEFAULT_RETRY_STATUSES,
};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use transport::{Transport, TransportRequest, TransportResponse};
