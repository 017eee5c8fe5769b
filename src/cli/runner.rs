//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::client::HyperionClient;
use crate::config::{ClientConfig, LOCAL_BASE_URL};
use crate::engine::{FetchOutcome, ResultSet};
use crate::error::{Error, Result};
use crate::output::write_rows_to_parquet;
use crate::payload::{Endpoint, FilterField, FilterSpec};
use crate::types::{FetchMode, JsonValue};
use serde_json::json;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Endpoints => self.list_endpoints(),
            Commands::Fetch {
                endpoint,
                filter,
                filter_json,
                mode,
                concurrency,
                output,
            } => {
                let endpoint: Endpoint = endpoint.parse()?;
                let filter = load_filter(filter.as_deref(), filter_json.as_deref())?;

                let mut config = self.load_config()?;
                if let Some(mode) = mode {
                    config.fetch.mode = mode.parse::<FetchMode>()?;
                }
                if let Some(concurrency) = concurrency {
                    config.fetch.concurrency = *concurrency;
                }

                self.fetch(config, endpoint, &filter, output.as_deref())
                    .await
            }
            Commands::Dropdown { endpoint, field } => {
                let endpoint: Endpoint = endpoint.parse()?;
                let field: FilterField = field.parse()?;
                let client = HyperionClient::new(self.load_config()?)?;
                let values = client.dropdown_selection(endpoint, field).await?;
                self.write_rows(&values, None)
            }
        }
    }

    /// Config file (or defaults) with command-line overrides applied
    fn load_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.cli.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::default(),
        };

        if self.cli.local {
            config.base_url = LOCAL_BASE_URL.to_string();
        }
        if let Some(ref url) = self.cli.base_url {
            config.base_url.clone_from(url);
        }
        if let Some(ref key) = self.cli.access_key {
            config.access_key = Some(key.clone());
        }

        config.validate()?;
        Ok(config)
    }

    async fn fetch(
        &self,
        config: ClientConfig,
        endpoint: Endpoint,
        filter: &FilterSpec,
        output: Option<&Path>,
    ) -> Result<()> {
        let client = HyperionClient::new(config)?;

        if !endpoint.is_paginated() {
            let rows = match endpoint {
                Endpoint::Regions => client.fetch_regions().await?,
                Endpoint::OperatorClassification => client.fetch_operator_classification().await?,
                _ => {
                    return Err(Error::UnsupportedOperation {
                        endpoint: endpoint.name().to_string(),
                        operation: "fetch (use the dropdown command)".to_string(),
                    })
                }
            };
            eprintln!("{endpoint}: {} rows", rows.len());
            return self.write_rows(&rows, output);
        }

        let result = client.query(endpoint, filter).await?;
        print_summary(endpoint, &result);

        if result.outcome() == FetchOutcome::Unauthorized {
            return Err(Error::Unauthorized {
                body: "access key rejected".to_string(),
            });
        }

        self.write_rows(result.rows(), output)
    }

    fn list_endpoints(&self) -> Result<()> {
        let endpoints: Vec<JsonValue> = Endpoint::ALL
            .into_iter()
            .map(|endpoint| {
                let filters: Vec<&str> = endpoint
                    .accepted_filters()
                    .into_iter()
                    .map(FilterField::name)
                    .collect();

                json!({
                    "name": endpoint.name(),
                    "method": endpoint.method().to_string(),
                    "path": endpoint.path(),
                    "paginated": endpoint.is_paginated(),
                    "filters": filters
                })
            })
            .collect();

        self.write_rows(&endpoints, None)
    }

    fn write_rows(&self, rows: &[JsonValue], output: Option<&Path>) -> Result<()> {
        if self.cli.format == OutputFormat::Parquet {
            let path = output.ok_or_else(|| {
                Error::config("--format parquet needs an --output path")
            })?;
            let written = write_rows_to_parquet(path, rows, None)?;
            debug!("Wrote {written} rows to {}", path.display());
            return Ok(());
        }

        match output {
            Some(path) => {
                let file = File::create(path).map_err(|e| {
                    Error::output(format!("Failed to create '{}': {e}", path.display()))
                })?;
                self.write_json(rows, BufWriter::new(file))
            }
            None => self.write_json(rows, BufWriter::new(std::io::stdout().lock())),
        }
    }

    fn write_json(&self, rows: &[JsonValue], mut out: impl Write) -> Result<()> {
        match self.cli.format {
            OutputFormat::Pretty => {
                serde_json::to_writer_pretty(&mut out, rows)?;
                writeln!(out)?;
            }
            _ => {
                for row in rows {
                    serde_json::to_writer(&mut out, row)?;
                    writeln!(out)?;
                }
            }
        }
        out.flush()?;
        Ok(())
    }
}

/// Filter from a file or inline JSON; an empty filter when neither is given
fn load_filter(path: Option<&Path>, inline: Option<&str>) -> Result<FilterSpec> {
    match (path, inline) {
        (Some(path), _) => FilterSpec::from_file(path),
        (None, Some(json)) => {
            let filter: FilterSpec = serde_json::from_str(json)?;
            filter.validate()?;
            Ok(filter)
        }
        (None, None) => Ok(FilterSpec::default()),
    }
}

fn print_summary(endpoint: Endpoint, result: &ResultSet) {
    let stats = result.stats();
    eprintln!(
        "{endpoint}: {} of {} rows, {} page(s), {} failed, {} retries, {}ms, outcome {}",
        result.len(),
        result.total_count(),
        stats.pages_fetched,
        stats.pages_failed,
        stats.retries,
        stats.duration_ms,
        result.outcome()
    );
    for failure in result.failures() {
        eprintln!(
            "  page {} (start {}): {} after {} attempt(s): {}",
            failure.page_index, failure.cursor, failure.kind, failure.attempts, failure.message
        );
    }
}
