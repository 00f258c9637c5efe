//! Local-filesystem backend
//!
//! Direct `std::fs` implementations of the backend capability set. The
//! copy path digests the stream while writing so every local transfer
//! gets a checksum in the log for free.

use super::Backend;
use crate::error::{IoResultExt, Result, StageError};
use crate::hash;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

/// Suffix for in-flight copies; renamed away only after a verified write
pub const TEMP_SUFFIX: &str = ".part";

/// Backend for paths on an ordinary filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend;

impl LocalBackend {
    /// Create a local backend
    pub fn new() -> Self {
        Self
    }

    fn preserve_attributes(&self, source: &Path, dest: &Path) -> Result<()> {
        let metadata = fs::metadata(source).with_path(source)?;
        fs::set_permissions(dest, metadata.permissions()).with_path(dest)?;
        if let Ok(mtime) = metadata.modified() {
            let _ = filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(mtime));
        }
        Ok(())
    }
}

impl Backend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn copy(&self, from: &str, to: &str) -> Result<()> {
        let (digest, bytes) = hash::copy_and_sum(Path::new(from), Path::new(to))?;
        debug!(%from, %to, bytes, checksum = %digest, "local copy complete");
        self.preserve_attributes(Path::new(from), Path::new(to))?;
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        fs::metadata(path).is_ok()
    }

    fn size(&self, path: &str) -> Result<Option<u64>> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StageError::io(path, e)),
        }
    }

    fn make_directories(&self, path: &str, mode: u32) -> Result<()> {
        fs::create_dir_all(path).with_path(path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(mode)).with_path(path)?;
        }
        #[cfg(not(unix))]
        let _ = mode;
        Ok(())
    }

    fn mkdir_for(&self, path: &str, mode: u32) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                info!(dir = %parent.display(), "making directory");
                self.make_directories(&parent.display().to_string(), mode)?;
            }
        }
        Ok(())
    }

    fn remove_file(&self, path: &str) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StageError::io(path, e)),
        }
    }

    fn remove_directory(&self, path: &str) -> Result<()> {
        fs::remove_dir(path).with_path(path)
    }

    fn remove_tree(&self, path: &str) -> Result<()> {
        fs::remove_dir_all(path).with_path(path)
    }

    fn temp_name(&self, path: &str) -> String {
        format!("{path}{TEMP_SUFFIX}")
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        info!(%from, %to, "renaming");
        fs::rename(from, to).with_path(from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, data: &[u8]) -> String {
        let path = dir.join(name);
        File::create(&path).unwrap().write_all(data).unwrap();
        path.display().to_string()
    }

    #[test]
    fn test_copy_and_size() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new();
        let src = write_file(dir.path(), "in.dat", &[0xABu8; 2048]);
        let dst = dir.path().join("out.dat").display().to_string();

        backend.copy(&src, &dst).unwrap();
        assert_eq!(backend.size(&dst).unwrap(), Some(2048));
        assert_eq!(backend.size(&src).unwrap(), backend.size(&dst).unwrap());
    }

    #[test]
    fn test_size_absent_is_none() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new();
        let missing = dir.path().join("ghost").display().to_string();
        assert_eq!(backend.size(&missing).unwrap(), None);
        assert!(!backend.exists(&missing));
    }

    #[test]
    fn test_remove_file_absent_is_ok_false() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new();
        let path = write_file(dir.path(), "f", b"x");

        assert!(backend.remove_file(&path).unwrap());
        assert!(!backend.remove_file(&path).unwrap());
    }

    #[test]
    fn test_mkdir_for_creates_parents() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new();
        let nested = dir.path().join("a/b/c/file.txt").display().to_string();

        backend.mkdir_for(&nested, 0o755).unwrap();
        assert!(dir.path().join("a/b/c").is_dir());
    }

    #[test]
    fn test_temp_name_and_rename() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new();
        let final_path = dir.path().join("out.root").display().to_string();
        let temp = backend.temp_name(&final_path);
        assert_eq!(temp, format!("{final_path}.part"));

        write_file(dir.path(), "out.root.part", b"payload");
        backend.rename(&temp, &final_path).unwrap();
        assert!(backend.exists(&final_path));
        assert!(!backend.exists(&temp));
    }

    #[test]
    fn test_remove_tree() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new();
        let sub = dir.path().join("work");
        fs::create_dir(&sub).unwrap();
        write_file(&sub, "leftover", b"junk");

        let sub_str = sub.display().to_string();
        assert!(backend.remove_directory(&sub_str).is_err());
        backend.remove_tree(&sub_str).unwrap();
        assert!(!sub.exists());
    }
}
