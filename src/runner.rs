//! High-level runner API for the loader.
//!
//! This module provides a simplified public interface that encapsulates the
//! setup of the connection pool, the source download and the format-specific
//! ingestion path.
//!
//! This is the primary API for external users and for the CLI.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use uuid::Uuid;

use crate::db::{self as db_pool, ConnectionParamsBuilder, SchemaInferrer, SqlTableWriter};
use crate::formats::delimited::CsvBatchReader;
use crate::formats::parquet::ParquetTableReader;
use crate::formats::{BatchReader, DelimitedConfig};
use crate::ingest::{IngestOptions, IngestOptionsBuilder, ingest_csv, ingest_parquet};
use crate::io::{SourceUri, fetch, open_source};

pub use crate::config::INDEX_LABEL;
pub use crate::io::SourceKind;

/// Arguments for running a data load operation
#[derive(Clone)]
pub struct LoadArgs {
    // Connection configuration
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,

    // Source configuration
    pub url: String,
    pub table_name: String,

    // Options
    pub batch_size: usize,
    /// Columns converted to timestamps on the CSV path; empty disables it
    pub timestamp_columns: Vec<String>,
    /// Name of the leading row-ordinal column, or `None` to omit it
    pub index_label: Option<String>,
    /// Parquet only: create the table when it does not exist
    pub create_table_if_missing: bool,
    /// Directory that receives the local copy of the source
    pub work_dir: PathBuf,
    pub quiet: bool,

    // Test-only: inject a pre-created pool (for SQLite testing)
    #[cfg(test)]
    pub test_pool: Option<crate::db::Pool>,
}

impl LoadArgs {
    fn ingest_options(&self) -> Result<IngestOptions> {
        Ok(IngestOptionsBuilder::default()
            .batch_size(self.batch_size)
            .timestamp_columns(self.timestamp_columns.clone())
            .create_table_if_missing(self.create_table_if_missing)
            .quiet(self.quiet)
            .build()?)
    }

    async fn pool(&self) -> Result<crate::db::Pool> {
        let params = ConnectionParamsBuilder::default()
            .user(&self.user)
            .password(&self.password)
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .build()?;
        info!("Connecting to {}", params.redacted());
        db_pool::pool::pool(&params).await
    }
}

/// Result of a completed data load operation
#[derive(Debug)]
pub struct LoadResult {
    pub run_id: String,
    pub source_kind: SourceKind,
    pub local_path: PathBuf,
    pub tables_replaced: usize,
    pub batches_written: usize,
    pub rows_written: u64,
    pub duration: Duration,
    /// p50, p90 and p99 batch write durations in milliseconds
    pub percentiles: (Option<u64>, Option<u64>, Option<u64>),
}

/// Run a data load operation with the specified arguments
///
/// This is the main entry point for loading data. It:
/// - Builds the connection string and a single-connection pool
/// - Retrieves the source into the work directory under a fixed name
/// - Dispatches on the URL suffix to the CSV or Parquet path
///
/// # Example
///
/// ```no_run
/// use pg_ingest::runner::{LoadArgs, run_load};
/// use std::path::PathBuf;
///
/// # async fn example() -> anyhow::Result<()> {
/// let args = LoadArgs {
///     user: "root".to_string(),
///     password: "root".to_string(),
///     host: "localhost".to_string(),
///     port: 5432,
///     database: "ny_taxi".to_string(),
///     url: "https://example.com/yellow_tripdata_2021-01.csv.gz".to_string(),
///     table_name: "yellow_taxi_trips".to_string(),
///     batch_size: 100_000,
///     timestamp_columns: vec![
///         "tpep_pickup_datetime".to_string(),
///         "tpep_dropoff_datetime".to_string(),
///     ],
///     index_label: Some("index".to_string()),
///     create_table_if_missing: false,
///     work_dir: PathBuf::from("."),
///     quiet: false,
/// };
///
/// let result = run_load(args).await?;
/// println!("Loaded {} rows in {:?}", result.rows_written, result.duration);
/// # Ok(())
/// # }
/// ```
pub async fn run_load(args: LoadArgs) -> Result<LoadResult> {
    let start = Instant::now();
    let run_id = Uuid::new_v4().to_string();

    let source_kind = SourceKind::detect(&args.url);
    let source = SourceUri::parse(&args.url)?;
    let local_path = args.work_dir.join(source_kind.local_filename());
    let options = args.ingest_options()?;

    // Create connection pool (or use test pool if provided)
    #[cfg(test)]
    let pool = match args.test_pool.clone() {
        Some(test_pool) => test_pool,
        None => args.pool().await?,
    };

    #[cfg(not(test))]
    let pool = args.pool().await?;

    info!(run_id = %run_id, kind = %source_kind, table = %args.table_name, "Starting load");
    fetch(&source, &local_path).await?;

    let sink = SqlTableWriter::new(pool, args.index_label.clone());
    let stats = if source_kind.is_parquet() {
        ingest_parquet(&sink, &local_path, &args.table_name, &options).await?
    } else {
        ingest_csv(&sink, &local_path, &args.table_name, &options).await?
    };

    Ok(LoadResult {
        run_id,
        source_kind,
        local_path,
        tables_replaced: stats.tables_replaced,
        batches_written: stats.batches_written,
        rows_written: stats.rows_written,
        duration: start.elapsed(),
        percentiles: stats.get_percentiles(),
    })
}

/// Retrieve the source and return the CREATE TABLE statement a load would use
///
/// The database is not contacted. CSV schemas come from the first batch after
/// timestamp coercion; Parquet schemas come from the file metadata.
pub async fn describe_source(args: &LoadArgs) -> Result<String> {
    let source_kind = SourceKind::detect(&args.url);
    let source = SourceUri::parse(&args.url)?;
    let local_path = args.work_dir.join(source_kind.local_filename());

    fetch(&source, &local_path).await?;

    let index_label = args.index_label.as_deref();
    if source_kind.is_parquet() {
        let reader = ParquetTableReader::open(&local_path)?;
        return Ok(SchemaInferrer::generate_ddl(
            &args.table_name,
            reader.schema(),
            index_label,
            args.create_table_if_missing,
        ));
    }

    let mut reader = CsvBatchReader::new(
        open_source(&local_path)?,
        &DelimitedConfig::csv(),
        args.batch_size,
    )?;
    let mut first = reader
        .next_batch()?
        .context("CSV source produced no batches")?;
    first.coerce_timestamps(&args.timestamp_columns)?;

    Ok(SchemaInferrer::generate_ddl(
        &args.table_name,
        &first.schema,
        index_label,
        false,
    ))
}
