//! Retrying copy with verification
//!
//! One call = one file moved, however many attempts that takes. Every
//! attempt writes to the backend's temp name and renames into place only
//! after the destination size matches the source, so a partially-written
//! file is never observable at the final path.

use crate::backend::{Backend, BackendSelector};
use crate::error::{Result, StageError};
use rand::Rng;
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Mode for directories created on the way to a destination
pub const DIR_MODE: u32 = 0o755;

/// Bounds for the retry loop
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of copy attempts before giving up
    pub max_attempts: u32,
    /// Lower bound of the randomized wait between attempts
    pub min_backoff: Duration,
    /// Upper bound of the randomized wait between attempts
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// Outcome of a successful resilient copy
#[derive(Debug, Clone)]
pub struct CopyStats {
    /// Bytes written to the destination
    pub bytes_copied: u64,
    /// Wall time of the successful attempt only
    pub duration: Duration,
    /// Transfer rate in bytes/second
    pub throughput: f64,
    /// Attempts used (0 for an elided self-copy)
    pub attempts: u32,
}

impl CopyStats {
    fn elided() -> Self {
        Self {
            bytes_copied: 0,
            duration: Duration::ZERO,
            throughput: 0.0,
            attempts: 0,
        }
    }
}

/// Copies files between backends with retries and verification
#[derive(Debug, Default)]
pub struct ResilientCopier {
    selector: BackendSelector,
    policy: RetryPolicy,
}

impl ResilientCopier {
    /// Create a copier with the default retry policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a copier with an explicit retry policy
    pub fn with_policy(policy: RetryPolicy) -> Self {
        Self {
            selector: BackendSelector::new(),
            policy,
        }
    }

    /// The backend selector this copier routes operations through
    pub fn selector(&self) -> &BackendSelector {
        &self.selector
    }

    /// Copy `from` to `to`, retrying transient failures.
    ///
    /// A missing source fails immediately; it will not appear within the
    /// retry window. All other failures are retried after a randomized
    /// backoff, up to the attempt bound.
    pub fn copy(&self, from: &str, to: &str) -> Result<CopyStats> {
        if from == to {
            info!(path = %from, "not copying file to itself");
            return Ok(CopyStats::elided());
        }

        let from_size = self
            .selector
            .backend_for(&[from])
            .size(from)?
            .ok_or_else(|| StageError::SourceMissing(from.to_string()))?;

        let dest_backend = self.selector.backend_for(&[to]);
        let temp = dest_backend.temp_name(to);
        info!(%from, to = %temp, "copying");

        let mut last_error = None;
        for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 {
                self.wait_a_bit();
            }
            debug!(attempt, %from, %to, "starting try");

            let start = Instant::now();
            match self.try_once(from, to, &temp, from_size) {
                Ok(()) => {
                    let duration = start.elapsed();
                    let throughput = if duration.as_secs_f64() > 0.0 {
                        from_size as f64 / duration.as_secs_f64()
                    } else {
                        0.0
                    };
                    info!(
                        "transferred {} in {:.2?}, avg. rate {}/s",
                        humansize::format_size(from_size, humansize::BINARY),
                        duration,
                        humansize::format_size(throughput as u64, humansize::BINARY),
                    );
                    return Ok(CopyStats {
                        bytes_copied: from_size,
                        duration,
                        throughput,
                        attempts: attempt,
                    });
                }
                Err(e) if e.is_recoverable() => {
                    warn!(attempt, %to, error = %e, "copy attempt failed");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(e) = last_error {
            error!(%from, %to, error = %e, "giving up");
        }
        Err(StageError::RetriesExhausted {
            from: from.to_string(),
            to: to.to_string(),
            attempts: self.policy.max_attempts,
        })
    }

    /// One attempt: clear leftovers, copy to the temp name, verify size,
    /// rename into place.
    fn try_once(&self, from: &str, to: &str, temp: &str, from_size: u64) -> Result<()> {
        // Some backends error on blind overwrite, so clear the final and
        // temp paths first. Leftover-removal failures are not themselves
        // fatal; the copy will surface any real problem.
        if let Err(e) = self.selector.backend_for(&[to]).remove_file(to) {
            debug!(path = %to, error = %e, "could not clear destination");
        }
        if temp != to {
            if let Err(e) = self.selector.backend_for(&[temp]).remove_file(temp) {
                debug!(path = %temp, error = %e, "could not clear temp file");
            }
        }

        self.selector
            .backend_for(&[temp])
            .mkdir_for(temp, DIR_MODE)?;
        self.selector.backend_for(&[from, temp]).copy(from, temp)?;

        let temp_backend = self.selector.backend_for(&[temp]);
        let to_size = temp_backend.size(temp)?.ok_or_else(|| {
            StageError::io(
                temp,
                io::Error::new(io::ErrorKind::NotFound, "destination missing after copy"),
            )
        })?;
        if to_size != from_size {
            return Err(StageError::SizeMismatch {
                from: from.to_string(),
                from_size,
                to: temp.to_string(),
                to_size,
            });
        }

        if temp != to {
            temp_backend.rename(temp, to)?;
        }
        Ok(())
    }

    fn wait_a_bit(&self) {
        let min = self.policy.min_backoff.as_millis() as u64;
        let max = self.policy.max_backoff.as_millis() as u64;
        let delay = Duration::from_millis(rand::thread_rng().gen_range(min..=max.max(min)));
        info!("waiting {:.1?} before next try", delay);
        std::thread::sleep(delay);
    }
}
