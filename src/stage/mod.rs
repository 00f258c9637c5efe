//! File staging module
//!
//! Manages a job-private staging directory: inputs are copied to local
//! scratch before use, outputs are copied back to their final
//! destinations at teardown, and the directory is cleaned up afterwards.

mod file;
mod manifest;
mod set;

pub use file::*;
pub use manifest::*;
pub use set::*;
