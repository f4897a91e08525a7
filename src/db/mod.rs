//! Database layer - connection pooling, schema inference and table writes

pub mod pool;
pub mod schema;
pub mod writer;

pub use pool::{ConnectionParamsBuilder, Pool};
pub use schema::SchemaInferrer;
pub use writer::{SqlTableWriter, TableSink};
