use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use thiserror::Error;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read archive {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decompress archive {}: {source}", .path.display())]
    Decompress {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reads a dump into memory, gunzipping it when it carries the gzip magic.
///
/// The whole buffer is held in memory; dumps of this system are small
/// enough that streaming buys nothing for a one-shot run.
pub fn read_archive(path: &Path) -> Result<Vec<u8>, ArchiveError> {
    if !path.exists() {
        return Err(ArchiveError::NotFound(path.to_path_buf()));
    }
    let io_err = |source| ArchiveError::Io { path: path.to_path_buf(), source };

    let mut raw = Vec::new();
    File::open(path)
        .map_err(io_err)?
        .read_to_end(&mut raw)
        .map_err(io_err)?;

    if !raw.starts_with(&GZIP_MAGIC) {
        tracing::warn!(
            "{} is not gzip-compressed, reading it as a raw dump",
            path.display()
        );
        return Ok(raw);
    }

    let mut decompressed = Vec::with_capacity(raw.len() * 4);
    GzDecoder::new(BufReader::new(raw.as_slice()))
        .read_to_end(&mut decompressed)
        .map_err(|source| ArchiveError::Decompress { path: path.to_path_buf(), source })?;

    tracing::info!(
        "Decompressed {} ({} bytes -> {} bytes)",
        path.display(),
        raw.len(),
        decompressed.len()
    );
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_missing_file_is_not_found() {
        let err = read_archive(Path::new("/definitely/not/here.gz")).unwrap_err();
        assert!(matches!(err, ArchiveError::NotFound(_)));
    }

    #[test]
    fn test_gzip_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(b"hello archive").unwrap();
        encoder.finish().unwrap();

        assert_eq!(read_archive(&path).unwrap(), b"hello archive");
    }

    #[test]
    fn test_truncated_gzip_fails_to_decompress() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[7u8; 4096]).unwrap();
        let full = encoder.finish().unwrap();
        std::fs::write(&path, &full[..full.len() / 2]).unwrap();

        let err = read_archive(&path).unwrap_err();
        assert!(matches!(err, ArchiveError::Decompress { .. }));
    }

    #[test]
    fn test_uncompressed_dump_is_read_raw() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.archive");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();
        assert_eq!(read_archive(&path).unwrap(), vec![1, 2, 3]);
    }
}
