pub mod reader;

pub use reader::CsvBatchReader;
