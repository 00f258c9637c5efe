//! Resilient copy module
//!
//! Wraps the storage backends' copy with bounded retries, temp-then-rename
//! atomicity, and size verification.

mod resilient;

pub use resilient::*;
