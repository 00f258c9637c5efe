//! Configuration settings for Stagehand
//!
//! Defines CLI arguments, the runtime staging configuration, and the
//! stage-area resolution policy.

use crate::copy::RetryPolicy;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Overrides every other stage-area source when set
pub const STAGE_ROOT_DEV_ENV: &str = "STAGEHAND_STAGE_ROOT_DEV";

/// Stage-area root consulted when no explicit area is given
pub const STAGE_ROOT_ENV: &str = "STAGEHAND_STAGE_ROOT";

/// Machine-local candidates tried when nothing else is configured.
/// Batch nodes have /scratch; general-purpose machines only /tmp.
pub const DEFAULT_STAGE_AREAS: &[&str] = &["/scratch", "/tmp"];

/// Stagehand - file staging and resilient copy for batch jobs
#[derive(Parser, Debug, Clone)]
#[command(name = "stagehand")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Stage job files to local scratch and copy them back resiliently")]
#[command(long_about = r#"
Stagehand manages a job-private staging directory: inputs are copied to
fast local scratch before the job runs, outputs are copied to their final
destinations (plain filesystem or root:// object store) afterwards, with
bounded retries and size verification on every transfer.

Examples:
  stagehand run --manifest job.json -- myprog --events 1000
  stagehand copy /data/in.root root://host//store/in.root
  stagehand checksum /scratch/12345/out.root
"#)]
pub struct CliArgs {
    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Stage a job's files around an external command
    #[command(name = "run")]
    Run {
        /// Job manifest listing inputs, outputs, and modify files
        #[arg(long, value_name = "PATH")]
        manifest: PathBuf,

        /// Name of the staging directory (default: process id)
        #[arg(long, value_name = "NAME")]
        stage_name: Option<String>,

        /// Parent directory for the staging directory
        #[arg(long, value_name = "DIR")]
        stage_area: Option<PathBuf>,

        /// Teardown behavior after the command finishes
        #[arg(long, value_enum, default_value = "full")]
        finish_mode: FinishMode,

        /// Log a SHA-256 digest of every output before copy-back
        #[arg(long)]
        checksums: bool,

        /// Command to run with staged paths substituted
        #[arg(trailing_var_arg = true, required = true, value_name = "COMMAND")]
        command: Vec<String>,
    },

    /// Copy one file with retries and size verification
    #[command(name = "copy")]
    Copy {
        /// Source path (local or root://)
        source: String,
        /// Destination path (local or root://)
        destination: String,
        /// Maximum copy attempts
        #[arg(long, default_value = "5", value_name = "NUM")]
        attempts: u32,
        /// Minimum backoff between attempts, in seconds
        #[arg(long, default_value = "5", value_name = "SECS")]
        min_wait: u64,
        /// Maximum backoff between attempts, in seconds
        #[arg(long, default_value = "10", value_name = "SECS")]
        max_wait: u64,
    },

    /// Print the SHA-256 digest of a local file
    #[command(name = "checksum")]
    Checksum {
        /// File to digest
        path: PathBuf,
    },
}

/// Teardown behavior of `StageSet::finish`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinishMode {
    /// Copy outputs to destinations, clean up, remove the staging directory
    #[default]
    Full,
    /// Copy outputs to destinations, keep everything for further staging
    Keep,
    /// Copy outputs, delete staged files, keep the directory for reuse
    Clean,
    /// Remove the staging directory WITHOUT copying outputs (rollback)
    Wipe,
}

/// Runtime configuration for a staging set
#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Name of the staging directory; defaults to the process id
    pub stage_name: Option<String>,
    /// Parent of the staging directory; resolved from the environment
    /// and defaults when unset
    pub stage_area: Option<PathBuf>,
    /// Glob patterns for input paths that must never be staged
    pub exclude_in: Vec<String>,
    /// Glob patterns for output paths that must never be staged
    pub exclude_out: Vec<String>,
    /// Perform the stage-in copy as soon as a file is registered
    pub auto_start: bool,
    /// Retry bounds for every transfer this set performs
    pub retry: RetryPolicy,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            stage_name: None,
            stage_area: None,
            // AFS is already a shared cache; staging it again only burns
            // scratch space.
            exclude_in: vec!["/afs/**".to_string()],
            exclude_out: Vec::new(),
            auto_start: true,
            retry: RetryPolicy::default(),
        }
    }
}

impl StageConfig {
    /// Configuration rooted at an explicit stage area
    pub fn with_area(area: impl Into<PathBuf>) -> Self {
        Self {
            stage_area: Some(area.into()),
            ..Self::default()
        }
    }
}

/// Resolve the parent directory for staging directories.
///
/// Priority: `STAGEHAND_STAGE_ROOT_DEV` > `explicit` > `STAGEHAND_STAGE_ROOT`
/// > first usable default area > current working directory.
pub fn resolve_stage_area(explicit: Option<&Path>) -> PathBuf {
    if let Some(dev) = env_path(STAGE_ROOT_DEV_ENV) {
        debug!(area = %dev.display(), "stage area from {}", STAGE_ROOT_DEV_ENV);
        return dev;
    }
    if let Some(area) = explicit {
        debug!(area = %area.display(), "stage area from constructor argument");
        return area.to_path_buf();
    }
    if let Some(root) = env_path(STAGE_ROOT_ENV) {
        debug!(area = %root.display(), "stage area from {}", STAGE_ROOT_ENV);
        return root;
    }

    for candidate in DEFAULT_STAGE_AREAS {
        let path = Path::new(candidate);
        if is_writable_dir(path) {
            debug!(area = %candidate, "stage area from default list");
            return path.to_path_buf();
        }
        if std::fs::create_dir_all(path).is_ok() && is_writable_dir(path) {
            debug!(area = %candidate, "created stage area from default list");
            return path.to_path_buf();
        }
        warn!(area = %candidate, "staging cannot use default area");
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    warn!(area = %cwd.display(), "falling back to current directory for staging");
    cwd
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Check writability by actually creating a probe file; permission bits
/// alone lie on network filesystems.
pub fn is_writable_dir(path: &Path) -> bool {
    if !path.is_dir() {
        return false;
    }
    let probe = path.join(format!(".stagehand-probe-{}", std::process::id()));
    match std::fs::File::create(&probe) {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}
