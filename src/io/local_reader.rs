use anyhow::{Context, Result};
use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Whether the file name marks gzip content
pub fn is_gzip(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".gz")
}

/// Open a local file for streaming, inflating it when the name ends in `.gz`
pub fn open_source(path: &Path) -> Result<Box<dyn Read + Send>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);

    if is_gzip(path) {
        Ok(Box::new(MultiGzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Read a whole local file into memory, inflating it when the name ends in `.gz`
pub fn read_source_bytes(path: &Path) -> Result<Bytes> {
    let mut buffer = Vec::new();
    open_source(path)?
        .read_to_end(&mut buffer)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(Bytes::from(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_plain_file_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        assert_eq!(&read_source_bytes(&path).unwrap()[..], b"a,b\n1,2\n");
    }

    #[test]
    fn test_gzip_file_inflated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.csv.gz");
        std::fs::write(&path, gzip(b"a,b\n1,2\n")).unwrap();

        let mut text = String::new();
        open_source(&path).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "a,b\n1,2\n");
    }

    #[test]
    fn test_multi_member_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.csv.gz");
        let mut data = gzip(b"a,b\n1,2\n");
        data.extend(gzip(b"3,4\n"));
        std::fs::write(&path, data).unwrap();

        assert_eq!(&read_source_bytes(&path).unwrap()[..], b"a,b\n1,2\n3,4\n");
    }

    #[test]
    fn test_corrupt_gzip_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.csv.gz");
        std::fs::write(&path, "not gzip").unwrap();

        assert!(read_source_bytes(&path).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(open_source(Path::new("/nonexistent/output.csv")).is_err());
    }
}
