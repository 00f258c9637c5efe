//! Error types for Stagehand
//!
//! This module defines all error types used throughout the staging layer,
//! providing enough path and attempt context to diagnose failures after
//! the fact.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for staging operations
#[derive(Error, Debug)]
pub enum StageError {
    /// I/O error during file operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source file absent at copy time; not transient, never retried
    #[error("Source missing: {0}")]
    SourceMissing(String),

    /// Destination size did not match the source after a copy attempt
    #[error("Size mismatch copying '{from}' ({from_size} bytes) to '{to}' ({to_size} bytes)")]
    SizeMismatch {
        from: String,
        from_size: u64,
        to: String,
        to_size: u64,
    },

    /// A copy kept failing until the attempt bound was reached
    #[error("Copy of '{from}' to '{to}' failed after {attempts} attempts")]
    RetriesExhausted {
        from: String,
        to: String,
        attempts: u32,
    },

    /// A remote storage command exited abnormally
    #[error("Remote command '{command}' failed (status {status:?}): {stderr}")]
    RemoteCommand {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    /// A path claimed the remote scheme but could not be parsed as a URL
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    /// Invalid exclude pattern or other configuration problem
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Job manifest parsing/writing error
    #[error("Manifest error: {0}")]
    ManifestError(String),

    /// Failed to launch an external command
    #[error("Could not run '{command}': {source}")]
    CommandLaunch {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl StageError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Check if this error is transient and worth another copy attempt
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::SizeMismatch { .. } | Self::RemoteCommand { .. }
        )
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Result type alias for staging operations
pub type Result<T> = std::result::Result<T, StageError>;

impl From<serde_json::Error> for StageError {
    fn from(err: serde_json::Error) -> Self {
        StageError::ManifestError(err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| StageError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = StageError::io("/test/path", io_err);
        assert!(err.path().is_some());
        assert_eq!(err.path().unwrap(), &PathBuf::from("/test/path"));
    }

    #[test]
    fn test_error_recoverability() {
        let recoverable = StageError::SizeMismatch {
            from: "/a".into(),
            from_size: 10,
            to: "/b".into(),
            to_size: 7,
        };
        assert!(recoverable.is_recoverable());

        let fatal = StageError::SourceMissing("/gone".into());
        assert!(!fatal.is_recoverable());
    }

    #[test]
    fn test_retries_exhausted_reports_attempts() {
        let err = StageError::RetriesExhausted {
            from: "/a".into(),
            to: "/b".into(),
            attempts: 5,
        };
        assert!(err.to_string().contains("5 attempts"));
    }
}
