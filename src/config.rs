//! Configuration constants for the loader
//!
//! This module centralizes all tunable parameters and constants used throughout
//! the application.

use std::time::Duration;

// ============================================================================
// Connection Configuration
// ============================================================================

/// How long to wait for the single pooled connection to become available
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Ingestion Configuration
// ============================================================================

/// Number of source rows read and written as one unit of work
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// Columns coerced to timestamps on the CSV path unless overridden
pub const DEFAULT_TIMESTAMP_COLUMNS: [&str; 2] = ["tpep_pickup_datetime", "tpep_dropoff_datetime"];

/// Name of the leading row-ordinal column written ahead of the source columns
pub const INDEX_LABEL: &str = "index";

/// Upper bound on bind parameters in a single INSERT statement
///
/// Postgres caps a statement at 65535 parameters and bundled SQLite at 32766.
pub const MAX_BIND_PARAMS: usize = 32_766;

// ============================================================================
// Source Configuration
// ============================================================================

/// External program used to retrieve remote sources
pub const FETCH_PROGRAM: &str = "wget";

/// Field values read as NULL from delimited sources
pub const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];
