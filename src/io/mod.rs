//! I/O layer for locating, retrieving and opening source files

pub mod fetch;
pub mod local_reader;
pub mod uri;

pub use fetch::fetch;
pub use local_reader::{open_source, read_source_bytes};
pub use uri::{SourceKind, SourceUri};
