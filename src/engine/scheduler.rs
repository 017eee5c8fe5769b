//! Bounded fan-out of the pages after page 1
//!
//! Page futures run on the calling task through a `FuturesUnordered`; a
//! semaphore caps how many requests are in flight. A permit is held for one
//! attempt only, never across a retry delay.

use super::fetch_page;
use super::progress::ProgressReporter;
use super::types::{PageFailure, PageRequest};
use crate::http::Transport;
use crate::pagination::RetryPolicy;
use crate::payload::FilterSpec;
use crate::types::JsonValue;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Rows of one page, tagged with its index
#[derive(Debug, Clone, PartialEq)]
pub struct PageBatch {
    pub page_index: u64,
    pub rows: Vec<JsonValue>,
}

/// What the scheduler collected
#[derive(Debug, Default)]
pub struct ScheduleReport {
    /// Pages in completion order
    pub batches: Vec<PageBatch>,
    /// Pages given up on
    pub failures: Vec<PageFailure>,
    /// Retries across all pages
    pub retries: u32,
    /// A page was rejected as unauthorized; remaining pages were dropped
    pub aborted: bool,
}

/// Fetches a set of pages with at most `concurrency` requests in flight
pub struct ConcurrentScheduler {
    transport: Arc<dyn Transport>,
    permits: Semaphore,
    concurrency: usize,
    retry: RetryPolicy,
}

impl ConcurrentScheduler {
    pub fn new(transport: Arc<dyn Transport>, concurrency: usize, retry: RetryPolicy) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            transport,
            permits: Semaphore::new(concurrency),
            concurrency,
            retry,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetch every page in `pages`, appending rows as pages complete
    pub async fn fetch_remaining(
        &self,
        url: &str,
        pages: &[PageRequest],
        filter: &FilterSpec,
        progress: &dyn ProgressReporter,
    ) -> ScheduleReport {
        debug!(
            "Scheduling {} page(s) with concurrency {}",
            pages.len(),
            self.concurrency
        );

        let mut report = ScheduleReport::default();
        let mut in_flight: FuturesUnordered<_> = pages
            .iter()
            .map(|request| {
                fetch_page(
                    self.transport.as_ref(),
                    url,
                    filter,
                    *request,
                    &self.retry,
                    Some(&self.permits),
                )
            })
            .collect();

        while let Some(result) = in_flight.next().await {
            report.retries += result.retries;

            match result.outcome {
                Ok(page) => {
                    progress.page_completed(result.request.index, page.rows.len());
                    report.batches.push(PageBatch {
                        page_index: result.request.index,
                        rows: page.rows,
                    });
                }
                Err(err) if err.is_fatal() => {
                    warn!(
                        "Page {} unauthorized, dropping {} pending page(s): {err}",
                        result.request.index,
                        in_flight.len()
                    );
                    report.aborted = true;
                    break;
                }
                Err(err) => {
                    let failure = PageFailure::new(result.request, &err, result.attempts);
                    progress.page_failed(&failure);
                    report.failures.push(failure);
                }
            }
        }

        report
    }
}
