// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Hyperion Client
//!
//! Async client for the Hyperion oil & gas analytics API. Every query
//! endpoint is paginated by offset; the client fetches all pages of a query
//! and hands back one result set.
//!
//! ## Features
//!
//! - **Typed filters**: one filter type, validated against each endpoint
//! - **Sequential or concurrent paging**: up to 25 page requests in flight
//! - **Retries**: transport-level backoff plus per-page retry policies
//! - **Typed outcomes**: failed pages are recorded, never silently lost
//! - **Arrow Output**: rows convert to an Arrow RecordBatch or a Parquet file
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hyperion_client::{ClientConfig, FilterSpec, HyperionClient, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = HyperionClient::new(ClientConfig::default().with_access_key("..."))?;
//!
//!     let filter = FilterSpec::builder()
//!         .state_code("TX")
//!         .date_range(start, end)
//!         .build()?;
//!
//!     let wells = client.wells(&filter).await?;
//!     println!("{} of {} rows, {}", wells.len(), wells.total_count(), wells.outcome());
//!
//!     let batch = wells.to_record_batch()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        HyperionClient                           │
//! │  wells() rigs() ... → query(endpoint, filter) → ResultSet        │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌───────────┬──────────────────┴──┬──────────────────┬───────────┐
//! │  Payload  │      Engine         │      HTTP        │  Output   │
//! ├───────────┼─────────────────────┼──────────────────┼───────────┤
//! │ FilterSpec│ PageFetcher         │ Transport        │ Arrow     │
//! │ Endpoint  │ ConcurrentScheduler │ Retry + Backoff  │ Parquet   │
//! │ encode()  │ RetryPolicy         │ Rate Limit       │           │
//! └───────────┴─────────────────────┴──────────────────┴───────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the client
pub mod error;

/// Common types and type aliases
pub mod types;

/// HTTP transport with retry and rate limiting
pub mod http;

/// Filters, endpoints and request bodies
pub mod payload;

/// Page envelopes and retry policies
pub mod pagination;

/// Paginated fetch orchestration
pub mod engine;

/// Arrow/Parquet output
pub mod output;

/// Client configuration
pub mod config;

/// Endpoint facade
pub mod client;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, FailureKind, Result};
pub use types::*;

// Re-export commonly used types
pub use client::HyperionClient;
pub use config::ClientConfig;
pub use engine::{FetchConfig, FetchOutcome, PageFailure, PageFetcher, ResultSet};
pub use pagination::RetryPolicy;
pub use payload::{Endpoint, FilterField, FilterSpec};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
