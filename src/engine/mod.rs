//! Pagination engine
//!
//! # Overview
//!
//! The engine module provides:
//! - `PageFetcher` - Fetches every page of a query into one `ResultSet`
//! - `ConcurrentScheduler` - Bounded fan-out of the pages after page 1
//! - `ProgressReporter` - Page-by-page progress events
//! - `FetchConfig` - Mode, concurrency and retry policies
//!
//! Page 1 is always fetched first; its envelope tells how many pages
//! follow. The caller's `FilterSpec` is never modified: each request gets
//! its cursor from the codec.

mod progress;
mod scheduler;
mod types;

pub use progress::{NoProgress, ProgressReporter, TracingProgress};
pub use scheduler::{ConcurrentScheduler, PageBatch, ScheduleReport};
pub use types::{
    FetchConfig, FetchOutcome, FetchStats, PageFailure, PageRequest, ResultSet,
    DEFAULT_CONCURRENCY,
};

use crate::error::{Error, Result};
use crate::http::{Transport, TransportRequest};
use crate::pagination::{Page, PaginationState, RetryPolicy, RetryState};
use crate::payload::{encode, FilterSpec};
use crate::types::FetchMode;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

/// Outcome of one page after its retries
pub(crate) struct PageResult {
    pub request: PageRequest,
    pub outcome: Result<Page>,
    /// Attempts made
    pub attempts: u32,
    /// Retries granted by the policy
    pub retries: u32,
}

/// Fetch one page, retrying retriable failures under `policy`
///
/// When `permits` is given, one permit is held per attempt.
async fn fetch_page(
    transport: &dyn Transport,
    url: &str,
    filter: &FilterSpec,
    request: PageRequest,
    policy: &RetryPolicy,
    permits: Option<&Semaphore>,
) -> PageResult {
    let mut retry = RetryState::new();

    loop {
        let attempt: Result<Page> = async {
            let _permit = match permits {
                Some(permits) => Some(
                    permits
                        .acquire()
                        .await
                        .map_err(|e| Error::Other(format!("request slots closed: {e}")))?,
                ),
                None => None,
            };
            let body = encode(filter, Some(request.cursor))?;
            let response = transport.send(TransportRequest::post(url, body)).await?;
            Page::from_body(response.body)
        }
        .await;

        let err = match attempt {
            Ok(page) => {
                return PageResult {
                    request,
                    outcome: Ok(page),
                    attempts: retry.attempts(),
                    retries: retry.retries(),
                }
            }
            Err(err) => err,
        };

        let attempts = retry.attempts();
        if err.is_retryable() {
            if let Some(delay) = retry.record_failure(policy) {
                warn!(
                    "Page {} (start {}) failed on attempt {attempts}, retrying in {:?}: {err}",
                    request.index, request.cursor, delay
                );
                tokio::time::sleep(delay).await;
                continue;
            }
        }

        return PageResult {
            request,
            outcome: Err(err),
            attempts,
            retries: retry.retries(),
        };
    }
}

/// Fetches every page of a query
pub struct PageFetcher {
    transport: Arc<dyn Transport>,
    config: FetchConfig,
    progress: Arc<dyn ProgressReporter>,
}

impl PageFetcher {
    /// Create a fetcher reporting progress through `tracing`
    pub fn new(transport: Arc<dyn Transport>, config: FetchConfig) -> Self {
        Self {
            transport,
            config,
            progress: Arc::new(TracingProgress::new()),
        }
    }

    /// Set the progress reporter
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Fetch mode, concurrency and retry policies
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch every page of `url` for `filter`
    ///
    /// Fails only for caller errors (an unparsable URL or an invalid
    /// filter). Network outcomes, including a rejected access key, are
    /// reported through the returned [`ResultSet`].
    pub async fn fetch_all(&self, url: &str, filter: &FilterSpec) -> Result<ResultSet> {
        Url::parse(url)?;
        filter.validate()?;

        let start = Instant::now();
        let mut result = ResultSet::empty();

        let first_request = PageRequest::new(0, filter.pagination_start);
        let first = fetch_page(
            self.transport.as_ref(),
            url,
            filter,
            first_request,
            &self.config.page_retry,
            None,
        )
        .await;
        result.stats.add_retries(first.retries);

        let page = match first.outcome {
            Ok(page) => page,
            Err(err) if err.is_fatal() => {
                warn!("Unauthorized on first page of {url}: {err}");
                result.unauthorized = true;
                return Ok(self.finish(result, start));
            }
            Err(err) => {
                let failure = PageFailure::new(first_request, &err, first.attempts);
                self.progress.page_failed(&failure);
                result.push_failure(failure);
                return Ok(self.finish(result, start));
            }
        };

        let envelope = page.envelope;
        result.total_count = envelope.total_count;
        let total_pages = envelope.total_pages();
        debug!(
            "{url}: total_count={}, page_size={}, total_pages={total_pages}",
            envelope.total_count, envelope.page_size
        );
        self.progress.started(total_pages, envelope.total_count);
        self.progress.page_completed(0, page.rows.len());
        result.push_page(page.rows);

        if total_pages <= 1 || !envelope.has_more() {
            return Ok(self.finish(result, start));
        }

        match self.config.mode {
            FetchMode::Sequential => {
                let mut state = PaginationState::new(first_request.cursor);
                match state.advance(&envelope) {
                    Ok(()) => self.fetch_sequential(url, filter, state, &mut result).await,
                    Err(err) => {
                        let request = PageRequest::new(state.page_index, state.cursor);
                        let failure = PageFailure::new(request, &err, 1);
                        self.progress.page_failed(&failure);
                        result.push_failure(failure);
                    }
                }
            }
            FetchMode::Concurrent => {
                let pages: Vec<PageRequest> = envelope
                    .remaining_cursors()
                    .into_iter()
                    .enumerate()
                    .map(|(i, cursor)| PageRequest::new(i as u64 + 1, cursor))
                    .collect();
                self.fetch_concurrent(url, filter, &pages, &mut result).await;
            }
        }

        Ok(self.finish(result, start))
    }

    /// Walk pages one at a time until the envelope says there are no more
    async fn fetch_sequential(
        &self,
        url: &str,
        filter: &FilterSpec,
        mut state: PaginationState,
        result: &mut ResultSet,
    ) {
        while !state.done {
            let request = PageRequest::new(state.page_index, state.cursor);
            let fetched = fetch_page(
                self.transport.as_ref(),
                url,
                filter,
                request,
                &self.config.page_retry,
                None,
            )
            .await;
            result.stats.add_retries(fetched.retries);

            match fetched.outcome {
                Ok(page) => match state.advance(&page.envelope) {
                    Ok(()) => {
                        self.progress.page_completed(request.index, page.rows.len());
                        result.push_page(page.rows);
                    }
                    Err(err) => {
                        let failure = PageFailure::new(request, &err, fetched.attempts);
                        self.progress.page_failed(&failure);
                        result.push_failure(failure);
                    }
                },
                Err(err) if err.is_fatal() => {
                    warn!("Unauthorized on page {}, stopping: {err}", request.index);
                    result.unauthorized = true;
                    state.mark_done();
                }
                Err(err) => {
                    let failure = PageFailure::new(request, &err, fetched.attempts);
                    self.progress.page_failed(&failure);
                    result.push_failure(failure);
                    state.skip();
                }
            }
        }
    }

    /// Hand the remaining pages to the scheduler on a dedicated pool
    async fn fetch_concurrent(
        &self,
        url: &str,
        filter: &FilterSpec,
        pages: &[PageRequest],
        result: &mut ResultSet,
    ) {
        let transport = match self.transport.dedicated_pool(self.config.concurrency) {
            Ok(pool) => pool,
            Err(err) => {
                warn!("Could not build a dedicated connection pool, sharing the client's: {err}");
                Arc::clone(&self.transport)
            }
        };

        let scheduler = ConcurrentScheduler::new(
            transport,
            self.config.concurrency,
            self.config.concurrent_retry.clone(),
        );
        let report = scheduler
            .fetch_remaining(url, pages, filter, self.progress.as_ref())
            .await;

        result.stats.add_retries(report.retries);
        for batch in report.batches {
            result.push_page(batch.rows);
        }
        for failure in report.failures {
            result.push_failure(failure);
        }
        result.unauthorized |= report.aborted;
    }

    fn finish(&self, mut result: ResultSet, start: Instant) -> ResultSet {
        result.stats.set_duration(start.elapsed().as_millis() as u64);
        info!(
            "Fetch finished: {} rows, {} page(s), {} failure(s), outcome {}",
            result.len(),
            result.stats.pages_fetched,
            result.failures.len(),
            result.outcome()
        );
        self.progress.finished(&result);
        result
    }
}

#[cfg(test)]
mod tests;
