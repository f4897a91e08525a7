//! Parquet file reader implementation.

use anyhow::{Context, Result};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::path::Path;
use tracing::debug;

use crate::db::schema::Schema;
use crate::formats::reader::{Batch, BatchReader, Row};
use crate::io::read_source_bytes;

use super::conversion::{record_batch_to_rows, schema_from_arrow};

/// Reads a whole Parquet file into a single in-memory batch
///
/// Gzip-wrapped files are inflated before decoding since the Parquet footer
/// needs random access.
pub struct ParquetTableReader {
    schema: Schema,
    rows: Option<Vec<Row>>,
}

impl ParquetTableReader {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = read_source_bytes(path)?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)
            .with_context(|| format!("Failed to read Parquet metadata from {}", path.display()))?;

        let schema = schema_from_arrow(builder.schema())?;
        let num_row_groups = builder.metadata().num_row_groups();

        let reader = builder.build().context("Failed to build Parquet reader")?;

        let mut rows = Vec::new();
        for record_batch in reader {
            let record_batch = record_batch.context("Failed to decode Parquet record batch")?;
            rows.extend(record_batch_to_rows(&record_batch)?);
        }

        debug!(
            "Decoded {} rows from {} row groups in {}",
            rows.len(),
            num_row_groups,
            path.display()
        );

        Ok(Self {
            schema,
            rows: Some(rows),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl BatchReader for ParquetTableReader {
    fn next_batch(&mut self) -> Result<Option<Batch>> {
        Ok(self.rows.take().map(|rows| Batch {
            schema: self.schema.clone(),
            offset: 0,
            rows,
        }))
    }
}
