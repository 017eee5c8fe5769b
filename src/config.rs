//! Client configuration
//!
//! [`ClientConfig`] is the serialisable form of everything the client needs:
//! service location, credentials, transport tuning and fetch behaviour. It is
//! loaded from YAML (or built in code) and turned into the runtime
//! [`HttpClientConfig`] and [`FetchConfig`].

use crate::engine::{FetchConfig, DEFAULT_CONCURRENCY};
use crate::error::{Error, Result};
use crate::http::{
    default_user_agent, HttpClientConfig, RateLimiterConfig, ACCESS_KEY_HEADER,
    DEFAULT_RETRY_STATUSES,
};
use crate::pagination::RetryPolicy;
use crate::types::{BackoffConfig, BackoffType, FetchMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Production service URL
pub const DEFAULT_BASE_URL: &str = "https://hyperion.api.synmax.com/";

/// Local development server URL
pub const LOCAL_BASE_URL: &str = "http://127.0.0.1:8080/";

/// Environment variable consulted when no access key is configured
pub const ACCESS_TOKEN_ENV: &str = "access_token";

// ============================================================================
// Top-Level Client Config
// ============================================================================

/// Complete client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Service root; endpoint paths are joined onto it
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key sent in the `access_key` header
    #[serde(default)]
    pub access_key: Option<String>,

    /// User agent override
    #[serde(default)]
    pub user_agent: Option<String>,

    /// HTTP transport configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Pagination behaviour
    #[serde(default)]
    pub fetch: FetchSettings,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_key: None,
            user_agent: None,
            http: HttpConfig::default(),
            fetch: FetchSettings::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults pointing at the production service
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults pointing at a local development server
    pub fn local() -> Self {
        Self {
            base_url: LOCAL_BASE_URL.to_string(),
            ..Self::default()
        }
    }

    /// Set the access key
    #[must_use]
    pub fn with_access_key(mut self, key: impl Into<String>) -> Self {
        self.access_key = Some(key.into());
        self
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read '{}': {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Check the configuration for values the client cannot work with
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;

        if self.access_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            return Err(Error::invalid_value("access_key", "must not be blank"));
        }
        if self.http.timeout_seconds == 0 {
            return Err(Error::invalid_value("http.timeout_seconds", "must be at least 1"));
        }
        let backoff = &self.http.retry_backoff;
        if backoff.initial_ms > backoff.max_ms {
            return Err(Error::invalid_value(
                "http.retry_backoff",
                format!("initial_ms {} exceeds max_ms {}", backoff.initial_ms, backoff.max_ms),
            ));
        }
        if self.fetch.concurrency == 0 {
            return Err(Error::invalid_value("fetch.concurrency", "must be at least 1"));
        }
        self.fetch
            .page_retry
            .validate()
            .map_err(|msg| Error::invalid_value("fetch.page_retry", msg))?;
        self.fetch
            .concurrent_retry
            .validate()
            .map_err(|msg| Error::invalid_value("fetch.concurrent_retry", msg))?;

        Ok(())
    }

    /// The base URL, parsed, with a trailing slash so endpoint paths join
    /// underneath it
    pub fn base_url(&self) -> Result<Url> {
        let raw = self.base_url.trim();
        if raw.is_empty() {
            return Err(Error::missing_field("base_url"));
        }
        let mut url = Url::parse(raw)?;
        if url.cannot_be_a_base() {
            return Err(Error::invalid_value("base_url", format!("'{raw}' is not a base URL")));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    /// The configured access key, else the `access_token` environment variable
    pub fn resolve_access_key(&self) -> Option<String> {
        pick_access_key(
            self.access_key.as_deref(),
            std::env::var(ACCESS_TOKEN_ENV).ok(),
        )
    }

    /// Runtime transport configuration
    pub fn http_config(&self) -> HttpClientConfig {
        let http = &self.http;
        let backoff = http.retry_backoff;

        let mut builder = HttpClientConfig::builder()
            .timeout(Duration::from_secs(http.timeout_seconds))
            .max_retries(http.max_retries)
            .retry_statuses(http.retry_statuses.clone())
            .backoff(
                backoff.backoff_type,
                Duration::from_millis(backoff.initial_ms),
                Duration::from_millis(backoff.max_ms),
            )
            .user_agent(
                self.user_agent
                    .clone()
                    .unwrap_or_else(default_user_agent),
            );

        if let Some(ref limit) = http.rate_limit {
            builder = builder.rate_limit(limit.clone());
        }
        if let Some(key) = self.resolve_access_key() {
            builder = builder.header(ACCESS_KEY_HEADER, key);
        }

        builder.build()
    }

    /// Runtime fetch configuration
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig::new()
            .with_mode(self.fetch.mode)
            .with_concurrency(self.fetch.concurrency)
            .with_page_retry(self.fetch.page_retry.clone())
            .with_concurrent_retry(self.fetch.concurrent_retry.clone())
    }
}

fn pick_access_key(explicit: Option<&str>, env: Option<String>) -> Option<String> {
    explicit
        .map(str::to_string)
        .or(env)
        .filter(|key| !key.trim().is_empty())
}

// ============================================================================
// HTTP Config
// ============================================================================

/// HTTP transport configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Transport-level retries for allowlisted statuses
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// HTTP status codes to retry on
    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,

    /// Retry backoff configuration
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: BackoffConfig,

    /// Optional client-side rate limit
    #[serde(default)]
    pub rate_limit: Option<RateLimiterConfig>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            retry_statuses: default_retry_statuses(),
            retry_backoff: default_retry_backoff(),
            rate_limit: None,
        }
    }
}

fn default_timeout() -> u64 {
    600
}

fn default_max_retries() -> u32 {
    10
}

fn default_retry_statuses() -> Vec<u16> {
    DEFAULT_RETRY_STATUSES.to_vec()
}

fn default_retry_backoff() -> BackoffConfig {
    BackoffConfig::new(BackoffType::Exponential, 2000, 120_000)
}

// ============================================================================
// Fetch Config
// ============================================================================

/// Pagination behaviour as written in a config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Sequential or concurrent page fetching
    #[serde(default)]
    pub mode: FetchMode,

    /// Page requests in flight in concurrent mode
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Retry policy for page 1 and sequential pages
    #[serde(default)]
    pub page_retry: RetryPolicy,

    /// Retry policy for pages fetched concurrently
    #[serde(default = "RetryPolicy::cyclic")]
    pub concurrent_retry: RetryPolicy,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            mode: FetchMode::default(),
            concurrency: default_concurrency(),
            page_retry: RetryPolicy::default(),
            concurrent_retry: RetryPolicy::cyclic(),
        }
    }
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}
