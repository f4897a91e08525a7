use anyhow::{Result, anyhow};
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Represents a parsed source URI
#[derive(Debug, Clone)]
pub enum SourceUri {
    /// Retrieved with the external fetch program
    Remote(Url),
    Local(PathBuf),
}

impl SourceUri {
    /// Parse a URI string into a SourceUri
    pub fn parse(uri: &str) -> Result<Self> {
        // Try parsing as URL first
        if let Ok(url) = Url::parse(uri) {
            match url.scheme() {
                "http" | "https" | "ftp" => {
                    if url.host_str().is_none_or(str::is_empty) {
                        return Err(anyhow!("URL missing host: {}", uri));
                    }
                    Ok(SourceUri::Remote(url))
                }
                "file" => {
                    let path = url
                        .to_file_path()
                        .map_err(|_| anyhow!("Invalid file:// URI: {}", uri))?;
                    Ok(SourceUri::Local(path))
                }
                // Windows drive letters parse as a one-letter scheme
                scheme if scheme.len() == 1 => Ok(SourceUri::Local(PathBuf::from(uri))),
                scheme => Err(anyhow!("Unsupported URI scheme: {}", scheme)),
            }
        } else {
            // Treat as local file path
            Ok(SourceUri::Local(PathBuf::from(uri)))
        }
    }
}

impl fmt::Display for SourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceUri::Remote(url) => write!(f, "{}", url),
            SourceUri::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Source file format, chosen from the URL suffix alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    ParquetGz,
    Parquet,
    CsvGz,
    Csv,
}

impl SourceKind {
    /// Select the format by case-sensitive suffix match
    ///
    /// Anything that is not one of the three recognized suffixes is read as
    /// CSV, whatever its content.
    pub fn detect(url: &str) -> Self {
        if url.ends_with(".parquet.gz") {
            SourceKind::ParquetGz
        } else if url.ends_with(".parquet") {
            SourceKind::Parquet
        } else if url.ends_with(".csv.gz") {
            SourceKind::CsvGz
        } else {
            SourceKind::Csv
        }
    }

    /// Fixed name of the local copy for this format
    pub fn local_filename(&self) -> &'static str {
        match self {
            SourceKind::ParquetGz => "output.parquet.gz",
            SourceKind::Parquet => "output.parquet",
            SourceKind::CsvGz => "output.csv.gz",
            SourceKind::Csv => "output.csv",
        }
    }

    pub fn is_parquet(&self) -> bool {
        matches!(self, SourceKind::ParquetGz | SourceKind::Parquet)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::ParquetGz => "parquet.gz",
            SourceKind::Parquet => "parquet",
            SourceKind::CsvGz => "csv.gz",
            SourceKind::Csv => "csv",
        };
        f.write_str(name)
    }
}
