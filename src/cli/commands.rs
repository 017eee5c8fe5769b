//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Hyperion analytics API client
#[derive(Parser, Debug)]
#[command(name = "hyperion")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Client configuration file (YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// API key (defaults to the config file, then $access_token)
    #[arg(long, global = true)]
    pub access_key: Option<String>,

    /// Service base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Use the local development server
    #[arg(long, global = true)]
    pub local: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List endpoints with their method, path and accepted filters
    Endpoints,

    /// Fetch every row of an endpoint
    Fetch {
        /// Endpoint name, e.g. `wells` or `short_term_forecast`
        endpoint: String,

        /// Filter file (YAML or JSON)
        #[arg(long)]
        filter: Option<PathBuf>,

        /// Inline filter JSON
        #[arg(long, conflicts_with = "filter")]
        filter_json: Option<String>,

        /// `sequential` or `concurrent`
        #[arg(long)]
        mode: Option<String>,

        /// Page requests in flight in concurrent mode
        #[arg(long)]
        concurrency: Option<usize>,

        /// Write rows here instead of stdout (required for parquet)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the values a filter field can take for an endpoint
    Dropdown {
        /// Endpoint the values are for
        endpoint: String,

        /// Filter field, e.g. `sub_region`
        field: String,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one row per line)
    Json,
    /// Human-readable output
    Pretty,
    /// Parquet file
    Parquet,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::try_parse_from([
            "hyperion",
            "--local",
            "fetch",
            "wells",
            "--filter-json",
            r#"{"state_code": "TX"}"#,
            "--mode",
            "sequential",
            "-f",
            "parquet",
            "-o",
            "wells.parquet",
        ])
        .unwrap();

        assert!(cli.local);
        assert_eq!(cli.format, OutputFormat::Parquet);
        match cli.command {
            Commands::Fetch {
                endpoint,
                filter_json,
                mode,
                output,
                ..
            } => {
                assert_eq!(endpoint, "wells");
                assert!(filter_json.is_some());
                assert_eq!(mode.as_deref(), Some("sequential"));
                assert_eq!(output, Some(PathBuf::from("wells.parquet")));
            }
            other => panic!("expected fetch, got {other:?}"),
        }
    }

    #[test]
    fn test_filter_sources_conflict() {
        let result = Cli::try_parse_from([
            "hyperion",
            "fetch",
            "wells",
            "--filter",
            "f.yaml",
            "--filter-json",
            "{}",
        ]);
        assert!(result.is_err());
    }
}
