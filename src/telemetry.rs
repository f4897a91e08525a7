/// Progress events emitted by the ingestion loops
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    /// Target table was dropped and recreated
    TableReplaced,
    /// Target table was created if it did not already exist
    TableEnsured,
    /// One batch was committed
    BatchWritten { rows: u64, duration_ms: u64 },
    /// A follow-up CSV chunk was read, parsed and written
    ChunkIngested { duration_ms: u64 },
}

/// Statistics aggregated from telemetry events
#[derive(Debug, Default, Clone)]
pub struct ProgressStats {
    pub tables_replaced: usize,
    pub tables_ensured: usize,
    pub batches_written: usize,
    pub rows_written: u64,
    pub batch_durations_ms: Vec<u64>,
    pub chunk_durations_ms: Vec<u64>,
}

impl ProgressStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a telemetry event
    pub fn update(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::TableReplaced => {
                self.tables_replaced += 1;
            }
            TelemetryEvent::TableEnsured => {
                self.tables_ensured += 1;
            }
            TelemetryEvent::BatchWritten { rows, duration_ms } => {
                self.batches_written += 1;
                self.rows_written += rows;
                self.batch_durations_ms.push(*duration_ms);
            }
            TelemetryEvent::ChunkIngested { duration_ms } => {
                self.chunk_durations_ms.push(*duration_ms);
            }
        }
    }

    /// Calculate percentile from batch durations
    pub fn percentile(&self, p: f64) -> Option<u64> {
        if self.batch_durations_ms.is_empty() {
            return None;
        }

        let mut sorted = self.batch_durations_ms.clone();
        sorted.sort_unstable();

        let index = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
        let index = index.saturating_sub(1).min(sorted.len() - 1);

        Some(sorted[index])
    }

    /// Get p50, p90, p99 percentiles
    pub fn get_percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        (
            self.percentile(50.0),
            self.percentile(90.0),
            self.percentile(99.0),
        )
    }
}
