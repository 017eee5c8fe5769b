//! Engine types
//!
//! Fetch configuration and the result of a `fetch_all` call.

use crate::error::{Error, FailureKind, Result};
use crate::output::json_to_arrow;
use crate::pagination::RetryPolicy;
use crate::types::{FetchMode, JsonValue};
use arrow::record_batch::RecordBatch;
use serde::Serialize;

/// Default number of page requests in flight in concurrent mode
pub const DEFAULT_CONCURRENCY: usize = 25;

/// Configuration for a paginated fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// How pages after the first are fetched
    pub mode: FetchMode,
    /// Maximum requests in flight in concurrent mode
    pub concurrency: usize,
    /// Retry policy for page 1 and for every page in sequential mode
    pub page_retry: RetryPolicy,
    /// Retry policy for pages fetched by the concurrent scheduler
    pub concurrent_retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mode: FetchMode::Concurrent,
            concurrency: DEFAULT_CONCURRENCY,
            page_retry: RetryPolicy::default(),
            concurrent_retry: RetryPolicy::cyclic(),
        }
    }
}

impl FetchConfig {
    /// Create a new fetch config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequential fetch with default retries
    #[must_use]
    pub fn sequential() -> Self {
        Self::default().with_mode(FetchMode::Sequential)
    }

    /// Set fetch mode
    #[must_use]
    pub fn with_mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set concurrency (values below 1 are raised to 1)
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the sequential page retry policy
    #[must_use]
    pub fn with_page_retry(mut self, policy: RetryPolicy) -> Self {
        self.page_retry = policy;
        self
    }

    /// Set the concurrent page retry policy
    #[must_use]
    pub fn with_concurrent_retry(mut self, policy: RetryPolicy) -> Self {
        self.concurrent_retry = policy;
        self
    }
}

/// Position of one page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    /// Zero-based page index
    pub index: u64,
    /// `pagination.start` sent for this page
    pub cursor: u64,
}

impl PageRequest {
    pub fn new(index: u64, cursor: u64) -> Self {
        Self { index, cursor }
    }
}

/// A page whose rows are missing from the result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFailure {
    pub page_index: u64,
    pub cursor: u64,
    pub kind: FailureKind,
    /// Attempts made before giving up
    pub attempts: u32,
    pub message: String,
}

impl PageFailure {
    pub fn new(request: PageRequest, error: &Error, attempts: u32) -> Self {
        Self {
            page_index: request.index,
            cursor: request.cursor,
            kind: error.kind(),
            attempts,
            message: error.to_string(),
        }
    }
}

/// How a fetch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    /// Every page was fetched
    Complete,
    /// Some pages failed; their rows are missing
    Partial,
    /// The service rejected the access key; the fetch stopped
    Unauthorized,
}

impl std::fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Unauthorized => "unauthorized",
        };
        f.write_str(name)
    }
}

/// Statistics from a fetch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    /// Pages whose rows were appended
    pub pages_fetched: u64,
    /// Pages recorded as failures
    pub pages_failed: u64,
    /// Rows collected
    pub rows: u64,
    /// Retries across all pages
    pub retries: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl FetchStats {
    /// Add a fetched page
    pub fn add_page(&mut self, rows: usize) {
        self.pages_fetched += 1;
        self.rows += rows as u64;
    }

    /// Add a failed page
    pub fn add_failure(&mut self) {
        self.pages_failed += 1;
    }

    /// Add retries
    pub fn add_retries(&mut self, retries: u32) {
        self.retries += u64::from(retries);
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}

/// Rows collected by one `fetch_all` call
///
/// Row order within a page is kept. Across pages it is page order in
/// sequential mode and completion order in concurrent mode.
#[derive(Debug, Clone)]
pub struct ResultSet {
    pub(crate) rows: Vec<JsonValue>,
    pub(crate) total_count: u64,
    pub(crate) failures: Vec<PageFailure>,
    pub(crate) unauthorized: bool,
    pub(crate) stats: FetchStats,
}

impl ResultSet {
    pub(crate) fn empty() -> Self {
        Self {
            rows: Vec::new(),
            total_count: 0,
            failures: Vec::new(),
            unauthorized: false,
            stats: FetchStats::default(),
        }
    }

    pub(crate) fn push_page(&mut self, rows: Vec<JsonValue>) {
        self.stats.add_page(rows.len());
        self.rows.extend(rows);
    }

    pub(crate) fn push_failure(&mut self, failure: PageFailure) {
        self.stats.add_failure();
        self.failures.push(failure);
    }

    pub fn rows(&self) -> &[JsonValue] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<JsonValue> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total the server reported on page 1 (0 if page 1 failed)
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Pages whose rows are missing
    pub fn failures(&self) -> &[PageFailure] {
        &self.failures
    }

    pub fn stats(&self) -> &FetchStats {
        &self.stats
    }

    pub fn outcome(&self) -> FetchOutcome {
        if self.unauthorized {
            FetchOutcome::Unauthorized
        } else if self.failures.is_empty() {
            FetchOutcome::Complete
        } else {
            FetchOutcome::Partial
        }
    }

    pub fn is_complete(&self) -> bool {
        self.outcome() == FetchOutcome::Complete
    }

    /// Convert the rows to an Arrow record batch
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        json_to_arrow(&self.rows, None)
    }
}
