//! Parquet file format support.
//!
//! This module reads Apache Parquet files into row batches. It includes:
//! - Schema mapping between Arrow and SQL types
//! - Conversion from Arrow RecordBatches to rows of values
//! - ParquetTableReader that implements the BatchReader trait

mod conversion;
mod reader;

pub use reader::ParquetTableReader;

#[cfg(test)]
pub(crate) use reader::tests::trips_parquet;
