//! Ingestion loops that move decoded batches into the target table

mod csv;
mod parquet;

pub use self::csv::ingest_csv;
pub use self::parquet::ingest_parquet;

use anyhow::Result;
use derive_builder::Builder;
use std::time::Instant;
use tracing::debug;

use crate::config::{DEFAULT_BATCH_SIZE, DEFAULT_TIMESTAMP_COLUMNS};
use crate::db::TableSink;
use crate::db::schema::Schema;
use crate::formats::Batch;
use crate::telemetry::{ProgressStats, TelemetryEvent};

/// Knobs shared by the CSV and Parquet paths
#[derive(Debug, Clone, Builder)]
pub struct IngestOptions {
    /// Rows per CSV batch
    #[builder(default = "DEFAULT_BATCH_SIZE")]
    pub batch_size: usize,
    /// Columns coerced to timestamps on the CSV path
    #[builder(default = "default_timestamp_columns()")]
    pub timestamp_columns: Vec<String>,
    /// Parquet path only: create the table before appending when it is missing
    #[builder(default)]
    pub create_table_if_missing: bool,
    /// Suppress progress lines on stdout
    #[builder(default)]
    pub quiet: bool,
}

pub fn default_timestamp_columns() -> Vec<String> {
    DEFAULT_TIMESTAMP_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .collect()
}

impl IngestOptions {
    fn progress(&self, line: impl AsRef<str>) {
        if !self.quiet {
            println!("{}", line.as_ref());
        }
    }
}

/// Append one batch and record how long the write took
async fn write_batch(
    sink: &dyn TableSink,
    table: &str,
    schema: &Schema,
    batch: &Batch,
    stats: &mut ProgressStats,
) -> Result<u64> {
    let start = Instant::now();
    let rows = sink.append(table, schema, batch).await?;
    let duration_ms = start.elapsed().as_millis() as u64;

    debug!(rows, offset = batch.offset, duration_ms, "Batch written");
    stats.update(&TelemetryEvent::BatchWritten { rows, duration_ms });
    Ok(rows)
}
