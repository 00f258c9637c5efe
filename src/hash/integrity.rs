//! Streaming SHA-256 digests
//!
//! All entry points read in fixed-size blocks so a digest never requires
//! holding a staged file in memory; `copy_and_sum` digests while writing
//! so the input is read exactly once.

use crate::error::{IoResultExt, Result, StageError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

const BLOCK_SIZE: usize = 1024 * 1024;

/// Digest of one working file, as reported by `StageSet::checksums`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChecksum {
    /// Path of the file that was digested
    pub path: String,
    /// SHA-256 digest as lowercase hex
    pub sha256: String,
    /// File size in bytes
    pub size: u64,
}

impl std::fmt::Display for FileChecksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}  {}", self.sha256, self.path)
    }
}

/// Compute the SHA-256 digest of a file
pub fn hash_file(path: &Path) -> Result<FileChecksum> {
    let file = File::open(path).with_path(path)?;
    let size = file.metadata().with_path(path)?.len();

    let mut reader = file;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BLOCK_SIZE];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| StageError::io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(FileChecksum {
        path: path.display().to_string(),
        sha256: hex::encode(hasher.finalize()),
        size,
    })
}

/// Compute the SHA-256 digest of in-memory data
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Copy a file while digesting it, reading the source exactly once.
///
/// Returns the digest of the data written to `dest` together with the
/// byte count, so callers can verify without a second read pass.
pub fn copy_and_sum(source: &Path, dest: &Path) -> Result<(String, u64)> {
    let mut reader = File::open(source).with_path(source)?;
    let out = File::create(dest).with_path(dest)?;
    let mut writer = BufWriter::with_capacity(BLOCK_SIZE, out);

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BLOCK_SIZE];
    let mut bytes_copied = 0u64;

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| StageError::io(source, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        writer
            .write_all(&buffer[..bytes_read])
            .map_err(|e| StageError::io(dest, e))?;
        bytes_copied += bytes_read as u64;
    }

    writer.flush().with_path(dest)?;

    Ok((hex::encode(hasher.finalize()), bytes_copied))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::TempDir;

    #[test]
    fn test_hash_bytes_known_value() {
        // sha256 of the empty string
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash_file_matches_hash_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        let data = vec![0x5au8; 3 * BLOCK_SIZE + 17];
        File::create(&path).unwrap().write_all(&data).unwrap();

        let sum = hash_file(&path).unwrap();
        assert_eq!(sum.sha256, hash_bytes(&data));
        assert_eq!(sum.size, data.len() as u64);
    }

    #[test]
    fn test_copy_and_sum() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.bin");
        let dst = dir.path().join("dst.bin");
        let data = b"staged content".to_vec();
        File::create(&src).unwrap().write_all(&data).unwrap();

        let (digest, bytes) = copy_and_sum(&src, &dst).unwrap();
        assert_eq!(bytes, data.len() as u64);
        assert_eq!(digest, hash_bytes(&data));
        assert_eq!(std::fs::read(&dst).unwrap(), data);
    }

    #[test]
    fn test_hash_file_missing() {
        let dir = TempDir::new().unwrap();
        assert!(hash_file(&dir.path().join("nope")).is_err());
    }
}
