use anyhow::{Context, Result, bail};
use std::path::Path;
use std::time::Instant;
use tracing::info;

use super::{IngestOptions, write_batch};
use crate::db::TableSink;
use crate::formats::delimited::CsvBatchReader;
use crate::formats::{BatchReader, DelimitedConfig};
use crate::io::open_source;
use crate::telemetry::{ProgressStats, TelemetryEvent};

/// Load a local CSV (optionally gzipped) into `table`, replacing it
pub async fn ingest_csv(
    sink: &dyn TableSink,
    path: &Path,
    table: &str,
    options: &IngestOptions,
) -> Result<ProgressStats> {
    let source = open_source(path)?;
    let mut reader = CsvBatchReader::new(source, &DelimitedConfig::csv(), options.batch_size)
        .with_context(|| format!("Failed to open CSV source {}", path.display()))?;

    ingest_batches(sink, &mut reader, table, options).await
}

/// Replace `table` with the first batch's schema, then append every batch
///
/// The first batch decides the column types; later batches are coerced to
/// them by the sink and abort the run when they cannot be.
pub async fn ingest_batches(
    sink: &dyn TableSink,
    reader: &mut dyn BatchReader,
    table: &str,
    options: &IngestOptions,
) -> Result<ProgressStats> {
    let mut stats = ProgressStats::new();

    let Some(mut first) = reader.next_batch()? else {
        bail!("Source produced no batches");
    };
    first.coerce_timestamps(&options.timestamp_columns)?;
    let schema = first.schema.clone();

    sink.replace(table, &schema).await?;
    stats.update(&TelemetryEvent::TableReplaced);

    if !first.is_empty() {
        write_batch(sink, table, &schema, &first, &mut stats).await?;
    }

    loop {
        let start = Instant::now();
        let Some(mut batch) = reader.next_batch()? else {
            break;
        };

        batch.coerce_timestamps(&options.timestamp_columns)?;
        write_batch(sink, table, &schema, &batch, &mut stats).await?;

        let elapsed = start.elapsed();
        stats.update(&TelemetryEvent::ChunkIngested {
            duration_ms: elapsed.as_millis() as u64,
        });
        options.progress(format!(
            "inserted another chunk, took {:.3} seconds",
            elapsed.as_secs_f64()
        ));
    }

    info!(
        table,
        batches = stats.batches_written,
        rows = stats.rows_written,
        slowest_chunk_ms = stats.chunk_durations_ms.iter().max().copied().unwrap_or(0),
        "CSV ingestion complete"
    );
    options.progress("Finished ingesting data into the postgres database");

    Ok(stats)
}
