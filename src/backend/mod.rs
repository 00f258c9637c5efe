//! Storage backend abstraction
//!
//! A capability-set interface over the storage systems staging can touch:
//! the local filesystem and the xrootd distributed object store. Which
//! backend services an operation is decided purely from path syntax, so
//! the selection rule is unit-testable without touching disk or network.

mod local;
mod xrootd;

pub use local::{LocalBackend, TEMP_SUFFIX};
pub use xrootd::{split_url, XrootdBackend, XROOTD_BIN_ENV};

use crate::error::Result;

/// Scheme marker that routes a path to the remote object store
pub const XROOTD_PREFIX: &str = "root:";

/// Check whether a path addresses the remote object store
pub fn is_remote(path: &str) -> bool {
    path.starts_with(XROOTD_PREFIX)
}

/// Uniform set of file operations a storage system must support.
///
/// Paths are strings rather than `Path`s because remote paths are URLs.
/// Absence is an ordinary value here: `exists` is a plain bool, `size`
/// is `None` for a missing file, and `remove_file` reports whether there
/// was anything to remove.
pub trait Backend {
    /// Short backend name for log context
    fn name(&self) -> &'static str;

    /// Copy a single file; overwrite semantics are backend-specific
    fn copy(&self, from: &str, to: &str) -> Result<()>;

    /// Check whether a file exists and is readable
    fn exists(&self, path: &str) -> bool;

    /// Size of a file in bytes, or `None` if it does not exist
    fn size(&self, path: &str) -> Result<Option<u64>>;

    /// Create a directory and any missing parents
    fn make_directories(&self, path: &str, mode: u32) -> Result<()>;

    /// Ensure the parent directory of `path` exists
    fn mkdir_for(&self, path: &str, mode: u32) -> Result<()>;

    /// Remove a file; `Ok(false)` when it was already absent
    fn remove_file(&self, path: &str) -> Result<bool>;

    /// Remove an empty directory
    fn remove_directory(&self, path: &str) -> Result<()>;

    /// Remove a directory and its contents
    fn remove_tree(&self, path: &str) -> Result<()>;

    /// Temporary name used while a copy of `path` is in flight
    fn temp_name(&self, path: &str) -> String;

    /// Rename a file within the backend
    fn rename(&self, from: &str, to: &str) -> Result<()>;
}

/// Routes each operation to the backend that can service its paths.
///
/// The remote backend wins if ANY involved path carries the remote
/// prefix: a copy spanning local scratch and the object store must be
/// driven by the side that understands the remote endpoint.
#[derive(Debug, Default)]
pub struct BackendSelector {
    local: LocalBackend,
    xrootd: XrootdBackend,
}

impl BackendSelector {
    /// Create a selector with default backend configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the single backend that must service all of `paths`
    pub fn backend_for(&self, paths: &[&str]) -> &dyn Backend {
        if paths.iter().any(|p| is_remote(p)) {
            &self.xrootd
        } else {
            &self.local
        }
    }

    /// The local-filesystem backend
    pub fn local(&self) -> &LocalBackend {
        &self.local
    }
}
