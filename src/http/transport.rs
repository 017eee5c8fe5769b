//! Transport boundary
//!
//! One request in, one parsed JSON response (or a typed failure) out. The
//! pagination engine only talks to this trait, which keeps it testable
//! without a network and lets the concurrent scheduler ask for its own
//! connection pool.

use crate::error::Result;
use crate::types::{JsonValue, Method, StringMap};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A single request handed to a [`Transport`]
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Extra headers for this request only
    pub headers: StringMap,
    /// JSON body
    pub body: Option<JsonValue>,
    /// Override the transport's timeout
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    /// Create a request with no body
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: StringMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Create a POST request with a JSON body
    pub fn post(url: impl Into<String>, body: JsonValue) -> Self {
        Self::new(Method::POST, url).json(body)
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A successful (2xx) response with its parsed body
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Parsed JSON body (`Null` for an empty body)
    pub body: JsonValue,
}

/// Executes single requests against the API
///
/// Implementations must map a 401 to [`crate::Error::Unauthorized`] and any
/// other non-2xx status that survives their own retry budget to
/// [`crate::Error::HttpStatus`]. A body carrying an `error` key is NOT an
/// error at this level.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute one request
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse>;

    /// A transport with its own connection pool sized for `max_connections`
    /// concurrent requests. It makes a single attempt per `send`, leaving
    /// retries to the caller's page policy. The pool is closed when the
    /// returned value is dropped.
    fn dedicated_pool(&self, max_connections: usize) -> Result<Arc<dyn Transport>>;
}
