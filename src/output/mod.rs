//! Output module
//!
//! Turns fetched rows into Arrow record batches and Parquet files.
//!
//! # Overview
//!
//! This module provides utilities for:
//! - Inferring Arrow schemas from JSON rows (first-seen column order)
//! - Converting JSON rows to Arrow RecordBatches
//! - Writing Parquet files

mod schema;
mod writer;

pub use schema::{infer_schema, json_to_arrow};
pub use writer::{
    write_batch_to_parquet, write_rows_to_parquet, ParquetWriter, ParquetWriterConfig,
};
