//! Page-by-page progress reporting

use super::types::{PageFailure, ResultSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Receives progress events from a fetch
///
/// Events arrive on the task driving the fetch, in completion order.
pub trait ProgressReporter: Send + Sync {
    /// Page 1 arrived; the size of the whole fetch is known
    fn started(&self, _total_pages: u64, _total_count: u64) {}

    /// A page's rows were appended
    fn page_completed(&self, _page_index: u64, _rows: usize) {}

    /// A page was given up on
    fn page_failed(&self, _failure: &PageFailure) {}

    /// The fetch returned
    fn finished(&self, _result: &ResultSet) {}
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// Logs progress through `tracing`
#[derive(Debug, Default)]
pub struct TracingProgress {
    total_pages: AtomicU64,
    done: AtomicU64,
}

impl TracingProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for TracingProgress {
    fn started(&self, total_pages: u64, total_count: u64) {
        self.total_pages.store(total_pages, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
        info!("Fetching {total_count} rows in {total_pages} page(s)");
    }

    fn page_completed(&self, page_index: u64, rows: usize) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.total_pages.load(Ordering::Relaxed);
        debug!("Page {page_index} done ({rows} rows), {done}/{total}");
    }

    fn page_failed(&self, failure: &PageFailure) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.total_pages.load(Ordering::Relaxed);
        warn!(
            "Page {} failed after {} attempt(s), {done}/{total}: {}",
            failure.page_index, failure.attempts, failure.message
        );
    }

    fn finished(&self, result: &ResultSet) {
        info!(
            "Fetched {} of {} rows ({}, {} failed page(s))",
            result.len(),
            result.total_count(),
            result.outcome(),
            result.failures().len()
        );
    }
}
