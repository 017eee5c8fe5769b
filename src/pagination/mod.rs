//! Pagination module
//!
//! The service paginates by offset: each request carries
//! `pagination.start`, each response reports `total_count`, `start` and
//! `page_size`. This module parses those envelopes, tracks the cursor of the
//! sequential loop, and defines the per-page retry policies.

mod retry;
mod types;

pub use retry::{RetryPolicy, RetryState};
pub use types::{extract_rows, Page, PageEnvelope, PaginationState};
