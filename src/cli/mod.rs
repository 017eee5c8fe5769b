//! CLI module
//!
//! Command-line interface for querying the Hyperion API.
//!
//! # Commands
//!
//! - `endpoints` - List endpoints and the filters they accept
//! - `fetch` - Fetch every row of an endpoint as JSON or Parquet
//! - `dropdown` - List the values a filter field can take

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
