use anyhow::Result;
use std::path::Path;
use std::time::Instant;
use tracing::info;

use super::{IngestOptions, write_batch};
use crate::db::TableSink;
use crate::formats::BatchReader;
use crate::formats::parquet::ParquetTableReader;
use crate::telemetry::{ProgressStats, TelemetryEvent};

/// Append a whole local Parquet file (optionally gzipped) to `table`
///
/// Unlike the CSV path the table is never replaced. It must already exist
/// unless `create_table_if_missing` is set.
pub async fn ingest_parquet(
    sink: &dyn TableSink,
    path: &Path,
    table: &str,
    options: &IngestOptions,
) -> Result<ProgressStats> {
    let mut stats = ProgressStats::new();

    let mut reader = ParquetTableReader::open(path)?;
    let schema = reader.schema().clone();

    if options.create_table_if_missing {
        sink.create_if_missing(table, &schema).await?;
        stats.update(&TelemetryEvent::TableEnsured);
    }

    let start = Instant::now();
    while let Some(batch) = reader.next_batch()? {
        if batch.is_empty() {
            continue;
        }
        write_batch(sink, table, &schema, &batch, &mut stats).await?;
    }
    let elapsed = start.elapsed().as_secs_f64();

    info!(table, rows = stats.rows_written, "Parquet ingestion complete");
    options.progress(format!("Total ingestion time: {} seconds", elapsed));

    Ok(stats)
}
