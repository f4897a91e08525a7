use anyhow::{Context, Result, bail};
use std::io::Read;

use crate::db::SchemaInferrer;
use crate::formats::reader::{Batch, BatchReader, DelimitedConfig, Row, Value};

/// Delimited file reader that yields fixed-size batches from any `Read` source
///
/// Column types are inferred per batch from the raw field text. A source with
/// a header and no data rows yields a single empty batch so callers still see
/// its columns.
pub struct CsvBatchReader<R: Read> {
    reader: csv::Reader<R>,
    header: Vec<String>,
    batch_size: usize,
    offset: u64,
    started: bool,
}

impl<R: Read> CsvBatchReader<R> {
    pub fn new(source: R, config: &DelimitedConfig, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            bail!("Batch size must be greater than zero");
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(config.delimiter)
            .quote(config.quote)
            .has_headers(true)
            .from_reader(source);

        let header: Vec<String> = reader
            .headers()
            .context("Failed to read CSV header")?
            .iter()
            .map(|s| s.to_string())
            .collect();

        if header.is_empty() {
            bail!("CSV source has no header row");
        }

        Ok(Self {
            reader,
            header,
            batch_size,
            offset: 0,
            started: false,
        })
    }
}

impl<R: Read> BatchReader for CsvBatchReader<R> {
    fn next_batch(&mut self) -> Result<Option<Batch>> {
        let mut records = Vec::with_capacity(self.batch_size.min(8192));
        let mut record = csv::StringRecord::new();

        while records.len() < self.batch_size {
            let has_record = self.reader.read_record(&mut record).with_context(|| {
                format!(
                    "Failed to parse CSV record {}",
                    self.offset + records.len() as u64 + 1
                )
            })?;
            if !has_record {
                break;
            }
            records.push(record.clone());
        }

        if records.is_empty() && self.started {
            return Ok(None);
        }
        self.started = true;

        let schema = SchemaInferrer::infer_from_records(&self.header, &records);

        let rows = records
            .iter()
            .map(|record| {
                record
                    .iter()
                    .zip(&schema.columns)
                    .map(|(field, col)| Value::parse(field, col.sql_type))
                    .collect::<Result<Row>>()
            })
            .collect::<Result<Vec<Row>>>()?;

        let batch = Batch {
            schema,
            offset: self.offset,
            rows,
        };
        self.offset += batch.len() as u64;

        Ok(Some(batch))
    }
}
