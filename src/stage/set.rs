//! Staging set lifecycle
//!
//! One `StageSet` owns one job-private working directory for its whole
//! lifetime. Setup failure never aborts the job: staging degrades to
//! pass-through and the job runs on the original paths. The one failure
//! callers must not ignore is a stage-out copy at `finish()`, reported
//! through the returned status.

use crate::backend::{is_remote, Backend};
use crate::config::{resolve_stage_area, FinishMode, StageConfig};
use crate::copy::{ResilientCopier, DIR_MODE};
use crate::error::{IoResultExt, Result, StageError};
use crate::hash::{self, FileChecksum};
use crate::stage::StagedFile;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Setup state of a staging set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// No working directory yet; the next staging call runs setup
    Uninitialized,
    /// Working directory exists and is usable
    Ready,
    /// Setup failed; all operations degrade to pass-through
    Disabled,
}

/// Manages staging of files to and from a job-private working directory.
///
/// ```no_run
/// use stagehand::config::{FinishMode, StageConfig};
/// use stagehand::stage::StageSet;
///
/// let mut staged = StageSet::new(StageConfig::default()).unwrap();
/// let input = staged.stage_in("/data/run042/events.root");
/// let output = staged.stage_out("/data/run042/hist.root", &[]);
/// // ... run the job against `input` and `output` ...
/// let status = staged.finish(FinishMode::Full);
/// assert_eq!(status, 0);
/// ```
///
/// The values returned by `stage_in` and `stage_out` may equal their
/// inputs when staging is not possible; callers use them unconditionally.
#[derive(Debug)]
pub struct StageSet {
    config: StageConfig,
    stage_dir: PathBuf,
    state: StageState,
    members: Vec<StagedFile>,
    num_in: usize,
    num_out: usize,
    num_mod: usize,
    exclude_in: Option<GlobSet>,
    exclude_out: Option<GlobSet>,
    copier: ResilientCopier,
}

impl StageSet {
    /// Create a staging set and attempt to set up its working directory.
    ///
    /// Only invalid exclude patterns are an error; a working directory
    /// that cannot be created just disables staging.
    pub fn new(config: StageConfig) -> Result<Self> {
        let exclude_in = build_globset(&config.exclude_in)?;
        let exclude_out = build_globset(&config.exclude_out)?;

        let area = resolve_stage_area(config.stage_area.as_deref());
        let name = config
            .stage_name
            .clone()
            .unwrap_or_else(|| std::process::id().to_string());
        let stage_dir = area.join(name);
        debug!(dir = %stage_dir.display(), "targeted staging directory");

        let mut set = Self {
            copier: ResilientCopier::with_policy(config.retry.clone()),
            config,
            stage_dir,
            state: StageState::Uninitialized,
            members: Vec::new(),
            num_in: 0,
            num_out: 0,
            num_mod: 0,
            exclude_in,
            exclude_out,
        };
        set.setup();
        Ok(set)
    }

    /// Create a staging set with the default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(StageConfig::default())
    }

    fn setup(&mut self) {
        debug!("entering stage setup");
        let dir = self.stage_dir.display().to_string();

        if self.stage_dir.is_dir() {
            info!(%dir, "requested stage directory already exists");
            self.state = StageState::Ready;
            self.list_stage_dir();
        } else {
            match self.copier.selector().local().make_directories(&dir, DIR_MODE) {
                Ok(()) => {
                    debug!(%dir, "created stage directory");
                    self.state = StageState::Ready;
                }
                Err(e) => {
                    warn!(%dir, error = %e, "staging disabled: could not create stage directory");
                    self.state = StageState::Disabled;
                }
            }
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.members.clear();
        self.num_in = 0;
        self.num_out = 0;
        self.num_mod = 0;
    }

    /// Stage an input file.
    ///
    /// Returns the working path the job should read, or the original
    /// path unchanged when staging is disabled or the file is excluded
    /// (no record is kept in either pass-through case).
    pub fn stage_in(&mut self, in_file: &str) -> String {
        if self.state == StageState::Uninitialized {
            self.setup();
        }
        if self.state != StageState::Ready {
            warn!(file = %in_file, "stage in not available");
            return in_file.to_string();
        }
        if matches(&self.exclude_in, in_file) {
            info!(file = %in_file, "staging disabled by exclude pattern");
            return in_file.to_string();
        }

        info!(file = %in_file, "stage in");
        let stage_name = self.staged_name(in_file);
        let mut member = StagedFile::new(
            stage_name.clone(),
            Some(in_file.to_string()),
            Vec::new(),
            true,
        );
        if self.config.auto_start && member.start(&self.copier) != 0 {
            error!(file = %in_file, "stage-in copy failed");
        }

        self.num_in += 1;
        self.members.push(member);
        stage_name
    }

    /// Stage an output file to one or more destinations.
    ///
    /// A record is kept even when staging is unavailable, so secondary
    /// destinations (e.g. a mirror on the object store) still receive a
    /// copy at `finish()`; in that case the returned working path is
    /// `primary` itself and the entry declines cleanup.
    pub fn stage_out(&mut self, primary: &str, extra_destinations: &[&str]) -> String {
        if self.state == StageState::Uninitialized {
            self.setup();
        }
        if primary.is_empty() {
            error!("primary stage file not specified");
            return String::new();
        }

        let (stage_name, cleanup) = if self.state != StageState::Ready {
            warn!(file = %primary, "stage out not available");
            (primary.to_string(), false)
        } else if matches(&self.exclude_out, primary) {
            info!(file = %primary, "staging disabled by exclude pattern");
            (primary.to_string(), false)
        } else {
            info!(file = %primary, "stage out");
            (self.staged_name(primary), true)
        };

        let mut destinations = Vec::with_capacity(1 + extra_destinations.len());
        destinations.push(primary.to_string());
        destinations.extend(extra_destinations.iter().map(|d| d.to_string()));

        let member = StagedFile::new(stage_name.clone(), None, destinations, cleanup);
        self.num_out += 1;
        self.members.push(member);
        stage_name
    }

    /// Stage a file the job will read and rewrite in place.
    ///
    /// Combines stage-in and stage-out: the original is copied to the
    /// working area, and the working copy is copied back over the
    /// original at `finish()`.
    pub fn stage_mod(&mut self, path: &str) -> String {
        if self.state == StageState::Uninitialized {
            self.setup();
        }
        if self.state != StageState::Ready {
            warn!(file = %path, "stage modify not available");
            return path.to_string();
        }
        if matches(&self.exclude_in, path) || matches(&self.exclude_out, path) {
            info!(file = %path, "staging disabled by exclude pattern");
            return path.to_string();
        }

        info!(file = %path, "stage modify");
        let stage_name = self.staged_name(path);
        let mut member = StagedFile::new(
            stage_name.clone(),
            Some(path.to_string()),
            vec![path.to_string()],
            true,
        );
        if self.config.auto_start && member.start(&self.copier) != 0 {
            error!(file = %path, "stage-modify copy failed");
        }

        self.num_mod += 1;
        self.members.push(member);
        stage_name
    }

    /// Run the stage-in copy for every member that has not started yet.
    /// Only needed when `auto_start` is off. Returns the failure count.
    pub fn start(&mut self) -> u32 {
        let mut rc = 0;
        for member in &mut self.members {
            rc += member.start(&self.copier);
        }
        rc
    }

    /// Copy outputs to their destinations and tear down per `mode`.
    ///
    /// Every member is processed even when an earlier one failed; the
    /// return value accumulates failures and 0 means full success.
    /// Nothing in teardown panics or returns an error: directory-removal
    /// trouble downgrades to logs plus a nonzero status.
    pub fn finish(&mut self, mode: FinishMode) -> u32 {
        debug!(?mode, "entering finish");
        if self.state == StageState::Disabled {
            warn!("staging disabled: only secondary targets can receive produced files");
        }

        if mode == FinishMode::Wipe {
            info!("deleting staging directory without retrieving output files");
            return self.remove_dir();
        }
        let keep = mode == FinishMode::Keep;

        let mut rc = 0;
        for member in &mut self.members {
            rc += member.finish(&self.copier, keep);
        }

        if mode == FinishMode::Keep {
            return rc;
        }

        self.reset();

        if mode == FinishMode::Clean {
            return rc;
        }

        rc + self.remove_dir()
    }

    fn remove_dir(&mut self) -> u32 {
        let mut rc = 0;
        if self.state == StageState::Ready {
            let dir = self.stage_dir.display().to_string();
            let local = self.copier.selector().local();
            if local.remove_directory(&dir).is_err() {
                warn!(%dir, "staging directory not empty after cleanup");
                self.list_stage_dir();
                warn!(%dir, "removing staging directory recursively");
                if let Err(e) = local.remove_tree(&dir) {
                    error!(%dir, error = %e, "could not remove stage directory");
                    rc = 2;
                }
            }
        }
        self.state = StageState::Uninitialized;
        self.reset();
        rc
    }

    /// Compute a SHA-256 digest of every stage-out member's working file.
    ///
    /// Intended as a verification pass before `finish()`; unreadable or
    /// remote working files are skipped with a log entry.
    pub fn checksums(&self) -> Vec<FileChecksum> {
        let mut sums = Vec::new();
        for member in &self.members {
            if member.destinations().is_empty() {
                continue;
            }
            let location = member.location();
            if is_remote(location) {
                warn!(%location, "cannot checksum a remote working file");
                continue;
            }
            match hash::hash_file(Path::new(location)) {
                Ok(sum) => {
                    info!(%location, sha256 = %sum.sha256, "checksum");
                    sums.push(sum);
                }
                Err(e) => error!(%location, error = %e, "could not checksum working file"),
            }
        }
        sums
    }

    /// Write every destination path to `path`, one per line, so rollback
    /// tooling knows which produced files to delete.
    pub fn dump_file_list(&self, path: &Path) -> Result<()> {
        let mut out = std::fs::File::create(path).with_path(path)?;
        for member in &self.members {
            for dest in member.destinations() {
                writeln!(out, "{dest}").with_path(path)?;
            }
        }
        Ok(())
    }

    /// Working-path name for a real file: the stage directory plus the
    /// real path's basename.
    pub fn staged_name(&self, file_name: &str) -> String {
        let base = Path::new(file_name)
            .file_name()
            .map(|b| b.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());
        self.stage_dir.join(base).display().to_string()
    }

    /// The working directory, if staging is operational
    pub fn stage_dir(&self) -> Option<&Path> {
        (self.state == StageState::Ready).then_some(self.stage_dir.as_path())
    }

    /// Current setup state
    pub fn state(&self) -> StageState {
        self.state
    }

    /// Files currently under management, in insertion order
    pub fn members(&self) -> &[StagedFile] {
        &self.members
    }

    /// Count of stage-in members since the last reset
    pub fn num_in(&self) -> usize {
        self.num_in
    }

    /// Count of stage-out members since the last reset
    pub fn num_out(&self) -> usize {
        self.num_out
    }

    /// Count of stage-modify members since the last reset
    pub fn num_mod(&self) -> usize {
        self.num_mod
    }

    fn list_stage_dir(&self) {
        if let Ok(entries) = std::fs::read_dir(&self.stage_dir) {
            for entry in entries.flatten() {
                info!(entry = %entry.path().display(), "stage directory contains");
            }
        }
    }
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern)
                .map_err(|e| StageError::config(format!("bad exclude pattern '{pattern}': {e}")))?,
        );
    }
    let set = builder
        .build()
        .map_err(|e| StageError::config(format!("could not build exclude set: {e}")))?;
    Ok(Some(set))
}

fn matches(set: &Option<GlobSet>, path: &str) -> bool {
    set.as_ref().is_some_and(|s| s.is_match(path))
}
