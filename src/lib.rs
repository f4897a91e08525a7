// Public API - only expose the runner module
pub mod runner;

// Internal modules - organized by subsystem
mod config;
mod db;
mod formats;
mod ingest;
mod io;
mod telemetry;

#[cfg(test)]
mod integ_tests;
