//! HTTP client with retry and rate limiting
//!
//! Provides the reqwest-backed [`Transport`] that handles:
//! - Automatic retries for an allowlist of status codes, with backoff
//! - Optional rate limiting to prevent API throttling
//! - The `access_key` header and client user agent on every request
//! - Classification of 401 as a fatal, non-retriable failure

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use super::transport::{Transport, TransportRequest, TransportResponse};
use crate::error::{Error, Result};
use crate::types::{BackoffType, JsonValue};
use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the API key
pub const ACCESS_KEY_HEADER: &str = "access_key";

/// Status codes retried by the transport unless configured otherwise
pub const DEFAULT_RETRY_STATUSES: [u16; 7] = [408, 429, 500, 502, 503, 504, 505];

/// Default user agent, identifying the client version
pub fn default_user_agent() -> String {
    format!("hyperion-client/{}/rust", env!("CARGO_PKG_VERSION"))
}

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for relative request paths
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum number of retries
    pub max_retries: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// HTTP status codes retried by the transport
    pub retry_statuses: Vec<u16>,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
    /// Idle connections kept per host (None = reqwest default)
    pub pool_max_idle_per_host: Option<usize>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(600),
            max_retries: 10,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(120),
            backoff_type: BackoffType::Exponential,
            retry_statuses: DEFAULT_RETRY_STATUSES.to_vec(),
            rate_limit: None,
            default_headers: HashMap::new(),
            user_agent: default_user_agent(),
            pool_max_idle_per_host: None,
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

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Replace the retried status allowlist
    pub fn retry_statuses(mut self, statuses: impl Into<Vec<u16>>) -> Self {
        self.config.retry_statuses = statuses.into();
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Send the API key on every request
    pub fn access_key(self, key: impl Into<String>) -> Self {
        self.header(ACCESS_KEY_HEADER, key)
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

/// Configuration for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request body (JSON)
    pub body: Option<JsonValue>,
    /// Override timeout for this request
    pub timeout: Option<Duration>,
    /// Override max retries for this request
    pub max_retries: Option<u32>,
}

/// HTTP client with retry and rate limiting
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);
        Self::build(config, rate_limiter)
    }

    fn build(config: HttpClientConfig, rate_limiter: Option<RateLimiter>) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent);

        if let Some(idle) = config.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(idle);
        }

        Ok(Self {
            client: builder.build()?,
            config,
            rate_limiter,
        })
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Make a generic request
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        config: RequestConfig,
    ) -> Result<Response> {
        let full_url = self.build_url(url);
        let max_retries = config.max_retries.unwrap_or(self.config.max_retries);
        let timeout = config.timeout.unwrap_or(self.config.timeout);

        let mut attempt = 0;

        loop {
            // Wait for rate limiter
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            // Build request
            let mut req = self.client.request(method.clone(), &full_url);

            for (key, value) in &self.config.default_headers {
                req = req.header(key.as_str(), value.as_str());
            }

            for (key, value) in &config.headers {
                req = req.header(key.as_str(), value.as_str());
            }

            if let Some(ref body) = config.body {
                req = req.json(body);
            }

            req = req.timeout(timeout);

            let delay = match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        debug!("Request succeeded: {} {}", method, full_url);
                        return Ok(response);
                    }

                    if status == StatusCode::UNAUTHORIZED {
                        let body = response.text().await.unwrap_or_default();
                        return Err(Error::Unauthorized { body });
                    }

                    if !self.is_retryable_status(status) || attempt >= max_retries {
                        if status == StatusCode::TOO_MANY_REQUESTS {
                            return Err(Error::RateLimited {
                                retry_after_seconds: extract_retry_after(&response)
                                    .unwrap_or_default(),
                            });
                        }
                        let body = response.text().await.unwrap_or_default();
                        return Err(Error::http_status(status.as_u16(), body));
                    }

                    let delay = if status == StatusCode::TOO_MANY_REQUESTS {
                        extract_retry_after(&response).map_or_else(
                            || self.calculate_backoff(attempt),
                            |secs| Duration::from_secs(secs).min(self.config.max_backoff),
                        )
                    } else {
                        self.calculate_backoff(attempt)
                    };

                    warn!(
                        "Request failed with {}, attempt {}/{}, retrying in {:?}",
                        status.as_u16(),
                        attempt + 1,
                        max_retries + 1,
                        delay
                    );
                    delay
                }
                Err(e) => {
                    let transient = e.is_timeout() || e.is_connect();
                    if !transient || attempt >= max_retries {
                        if e.is_timeout() {
                            return Err(Error::Timeout {
                                timeout_ms: timeout.as_millis() as u64,
                            });
                        }
                        return Err(Error::Http(e));
                    }

                    let delay = self.calculate_backoff(attempt);
                    warn!(
                        "Request error ({}), attempt {}/{}, retrying in {:?}",
                        e,
                        attempt + 1,
                        max_retries + 1,
                        delay
                    );
                    delay
                }
            };

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
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

    /// Calculate backoff delay for a given attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        self.config.backoff_type.delay(
            self.config.initial_backoff,
            self.config.max_backoff,
            attempt,
        )
    }

    fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.config.retry_statuses.contains(&status.as_u16())
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let config = RequestConfig {
            headers: request.headers,
            body: request.body,
            timeout: request.timeout,
            max_retries: None,
        };

        let response = self
            .request(request.method.into(), &request.url, config)
            .await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        let body = if text.trim().is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| Error::malformed(format!("response body is not JSON: {e}")))?
        };

        Ok(TransportResponse { status, body })
    }

    fn dedicated_pool(&self, max_connections: usize) -> Result<Arc<dyn Transport>> {
        let mut config = self.config.clone();
        config.pool_max_idle_per_host = Some(max_connections);
        config.max_retries = 0;
        let client = Self::build(config, self.rate_limiter.clone())?;
        Ok(Arc::new(client))
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut config = self.config.clone();
        if config.default_headers.contains_key(ACCESS_KEY_HEADER) {
            config
                .default_headers
                .insert(ACCESS_KEY_HEADER.to_string(), "***".to_string());
        }
        f.debug_struct("HttpClient")
            .field("config", &config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Extract retry-after header value
fn extract_retry_after(response: &Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
}
