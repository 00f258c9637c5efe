//! Content digest module
//!
//! Provides streaming SHA-256 digests and single-pass copy-and-sum used
//! to validate transfers independent of size-only verification.

mod integrity;

pub use integrity::*;
