//! A single tracked file in a staging set
//!
//! Deliberately a simple value object: the only state transition is the
//! `started` latch guarding duplicate copy-ins. Failure handling is
//! best-effort counting; the owning set decides what a nonzero count
//! means for the job.

use crate::backend::{is_remote, Backend};
use crate::copy::ResilientCopier;
use std::path::Path;
use tracing::{debug, error, info};

/// One file under staging management
#[derive(Debug, Clone)]
pub struct StagedFile {
    source: Option<String>,
    location: String,
    destinations: Vec<String>,
    cleanup: bool,
    started: bool,
}

impl StagedFile {
    /// Create a staged file record.
    ///
    /// A destination equal to the working location is elided: the
    /// artifact already resides at its own destination, so the entry
    /// also declines cleanup.
    pub fn new(
        location: impl Into<String>,
        source: Option<String>,
        destinations: Vec<String>,
        cleanup: bool,
    ) -> Self {
        let location = location.into();
        let before = destinations.len();
        let destinations: Vec<String> =
            destinations.into_iter().filter(|d| *d != location).collect();
        let cleanup = if destinations.len() != before {
            false
        } else {
            cleanup
        };

        Self {
            source,
            location,
            destinations,
            cleanup,
            started: false,
        }
    }

    /// Working-area path of this file
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Original path for stage-in / stage-modify entries
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Final paths that receive the file's content at teardown
    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }

    /// Whether the working copy is deleted once destinations are satisfied
    pub fn cleanup(&self) -> bool {
        self.cleanup
    }

    /// Whether the stage-in copy has run
    pub fn started(&self) -> bool {
        self.started
    }

    /// Perform the stage-in copy, at most once.
    ///
    /// Returns the number of failed copies (0 or 1). Failure is not
    /// fatal here; the caller decides whether the job can proceed on the
    /// original path.
    pub fn start(&mut self, copier: &ResilientCopier) -> u32 {
        self.dump_state();
        let mut failures = 0;
        if let Some(source) = self.source.clone() {
            if !self.started && source != self.location {
                if let Err(e) = copier.copy(&source, &self.location) {
                    error!(%source, location = %self.location, error = %e, "stage-in copy failed");
                    failures = 1;
                }
            }
        }
        self.started = true;
        failures
    }

    /// Copy the working file to every destination, then clean up.
    ///
    /// Every destination is attempted even after a failure; the return
    /// value is the accumulated failure count (0 = all satisfied). The
    /// working copy is deleted only when `keep` is false, this entry
    /// wants cleanup, and the file is writable.
    pub fn finish(&mut self, copier: &ResilientCopier, keep: bool) -> u32 {
        self.dump_state();
        let mut failures = 0;
        for dest in &self.destinations {
            if let Err(e) = copier.copy(&self.location, dest) {
                error!(location = %self.location, %dest, error = %e, "stage-out copy failed");
                failures += 1;
            }
        }

        if !keep && self.cleanup && is_writable_file(&self.location) {
            info!(location = %self.location, "removing working copy");
            let backend = copier.selector().backend_for(&[self.location.as_str()]);
            if let Err(e) = backend.remove_file(&self.location) {
                error!(location = %self.location, error = %e, "could not remove working copy");
            }
        } else {
            debug!(location = %self.location, "leaving working copy in place");
        }
        failures
    }

    /// Log the full record for post-mortem diagnosis
    pub fn dump_state(&self) {
        debug!(
            source = ?self.source,
            location = %self.location,
            destinations = ?self.destinations,
            cleanup = self.cleanup,
            started = self.started,
            "staged file state"
        );
    }
}

fn is_writable_file(location: &str) -> bool {
    if is_remote(location) {
        return false;
    }
    match std::fs::metadata(Path::new(location)) {
        Ok(meta) => !meta.permissions().readonly(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::RetryPolicy;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fast_copier() -> ResilientCopier {
        ResilientCopier::with_policy(RetryPolicy {
            max_attempts: 2,
            min_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        })
    }

    fn write_file(dir: &Path, name: &str, data: &[u8]) -> String {
        let path = dir.join(name);
        File::create(&path).unwrap().write_all(data).unwrap();
        path.display().to_string()
    }

    #[test]
    fn test_own_location_never_a_destination() {
        let file = StagedFile::new(
            "/work/out.root",
            None,
            vec!["/work/out.root".to_string(), "/final/out.root".to_string()],
            true,
        );
        assert_eq!(file.destinations(), &["/final/out.root".to_string()]);
        assert!(!file.cleanup());
    }

    #[test]
    fn test_start_copies_in_once() {
        let dir = TempDir::new().unwrap();
        let source = write_file(dir.path(), "in.dat", b"original");
        let location = dir.path().join("staged.dat").display().to_string();
        let copier = fast_copier();

        let mut file = StagedFile::new(location.clone(), Some(source.clone()), vec![], true);
        assert_eq!(file.start(&copier), 0);
        assert!(file.started());
        assert_eq!(std::fs::read(&location).unwrap(), b"original");

        // A second start must not copy again.
        std::fs::write(&source, b"changed after start").unwrap();
        assert_eq!(file.start(&copier), 0);
        assert_eq!(std::fs::read(&location).unwrap(), b"original");
    }

    #[test]
    fn test_start_skips_when_source_is_location() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "here.dat", b"data");
        let copier = fast_copier();

        let mut file = StagedFile::new(path.clone(), Some(path.clone()), vec![], true);
        assert_eq!(file.start(&copier), 0);
        assert!(file.started());
    }

    #[test]
    fn test_finish_copies_to_all_destinations_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let location = write_file(dir.path(), "work.dat", b"product");
        let dest1 = dir.path().join("final/a.dat").display().to_string();
        let dest2 = dir.path().join("mirror/b.dat").display().to_string();
        let copier = fast_copier();

        let mut file = StagedFile::new(location.clone(), None, vec![dest1.clone(), dest2.clone()], true);
        assert_eq!(file.finish(&copier, false), 0);
        assert_eq!(std::fs::read(&dest1).unwrap(), b"product");
        assert_eq!(std::fs::read(&dest2).unwrap(), b"product");
        assert!(!Path::new(&location).exists());
    }

    #[test]
    fn test_finish_keep_retains_working_copy() {
        let dir = TempDir::new().unwrap();
        let location = write_file(dir.path(), "work.dat", b"product");
        let dest = dir.path().join("final.dat").display().to_string();
        let copier = fast_copier();

        let mut file = StagedFile::new(location.clone(), None, vec![dest.clone()], true);
        assert_eq!(file.finish(&copier, true), 0);
        assert_eq!(std::fs::read(&dest).unwrap(), b"product");
        assert!(Path::new(&location).exists());
    }

    #[test]
    fn test_finish_counts_failures_but_drains_all_destinations() {
        let dir = TempDir::new().unwrap();
        let location = write_file(dir.path(), "work.dat", b"product");
        let blocker = write_file(dir.path(), "blocker", b"");
        let bad_dest = format!("{blocker}/cannot/create");
        let good_dest = dir.path().join("ok.dat").display().to_string();
        let copier = fast_copier();

        let mut file = StagedFile::new(
            location,
            None,
            vec![bad_dest, good_dest.clone()],
            false,
        );
        assert_eq!(file.finish(&copier, false), 1);
        assert_eq!(std::fs::read(&good_dest).unwrap(), b"product");
    }
}
