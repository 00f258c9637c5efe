//! # Stagehand - File Staging for Batch Jobs
//!
//! Stagehand is the file-movement support layer for scientific batch
//! jobs: it stages input and output files between shared storage and
//! machine-local scratch disk, copies files across heterogeneous
//! backends (plain filesystem, xrootd object store), retries transient
//! failures, and reports job-level summary data back to the pipeline.
//!
//! ## Features
//!
//! - **Staging sets**: one job-private working directory, set up once
//!   and torn down idempotently
//! - **Resilient copy**: bounded retries, randomized backoff, temp-file
//!   then rename, size verification
//! - **Backend abstraction**: local filesystem and `root://` object
//!   store behind one capability interface, selected by path syntax
//! - **Graceful degradation**: staging failures fall back to operating
//!   on the original paths instead of failing the job
//! - **Checksums**: streaming SHA-256 verification of produced files
//!
//! ## Quick Start
//!
//! ```no_run
//! use stagehand::config::{FinishMode, StageConfig};
//! use stagehand::stage::StageSet;
//!
//! let mut staged = StageSet::new(StageConfig::default()).unwrap();
//!
//! let input = staged.stage_in("/data/run042/events.root");
//! let output = staged.stage_out("/data/run042/hist.root", &[]);
//!
//! // ... run the job reading `input` and writing `output` ...
//!
//! let status = staged.finish(FinishMode::Full);
//! assert_eq!(status, 0, "at least one output failed to reach its destination");
//! ```
//!
//! ## Resilient copies without staging
//!
//! ```no_run
//! use stagehand::copy::ResilientCopier;
//!
//! let copier = ResilientCopier::new();
//! let stats = copier
//!     .copy("/scratch/12345/out.root", "root://host//store/out.root")
//!     .unwrap();
//! println!("{} bytes in {:?}", stats.bytes_copied, stats.duration);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod copy;
pub mod error;
pub mod hash;
pub mod runner;
pub mod stage;
pub mod summary;

// Re-export commonly used types
pub use config::{FinishMode, StageConfig};
pub use copy::{CopyStats, ResilientCopier, RetryPolicy};
pub use error::{Result, StageError};
pub use stage::{StageSet, StageState, StagedFile};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use stagehand::prelude::*;
    //! ```

    pub use crate::backend::{Backend, BackendSelector, LocalBackend, XrootdBackend};
    pub use crate::config::{FinishMode, StageConfig};
    pub use crate::copy::{CopyStats, ResilientCopier, RetryPolicy};
    pub use crate::error::{Result, StageError};
    pub use crate::hash::{hash_file, FileChecksum};
    pub use crate::stage::{JobManifest, StageSet, StageState, StagedFile};
    pub use crate::summary::JobSummary;
}
