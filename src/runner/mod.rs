//! External command execution
//!
//! Runs job payloads and pipeline helpers with begin/end logging and wall
//! timing, returning a structured status instead of raw shell codes.

use crate::error::{Result, StageError};
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::info;

/// Outcome of one external command
#[derive(Debug, Clone)]
pub struct RunStatus {
    /// Process exit code; -1 when terminated by a signal
    pub code: i32,
    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl RunStatus {
    /// True when the command exited zero
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Run an external command, inheriting stdio, and report its status.
///
/// Launch failure (missing binary) is an error; an unsuccessful exit is
/// an ordinary `RunStatus` the caller inspects.
pub fn run(program: &str, args: &[String]) -> Result<RunStatus> {
    info!(%program, ?args, "about to run");
    let start = Instant::now();

    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|source| StageError::CommandLaunch {
            command: program.to_string(),
            source,
        })?;

    let duration = start.elapsed();
    let code = status.code().unwrap_or(-1);
    info!(%program, code, "run finished in {:.2?}", duration);

    Ok(RunStatus { code, duration })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_success() {
        let status = run("true", &[]).unwrap();
        assert!(status.success());
        assert_eq!(status.code, 0);
    }

    #[test]
    fn test_run_nonzero_exit_is_not_an_error() {
        let status = run("false", &[]).unwrap();
        assert!(!status.success());
        assert_ne!(status.code, 0);
    }

    #[test]
    fn test_missing_binary_is_an_error() {
        assert!(run("definitely-not-a-real-binary-xyz", &[]).is_err());
    }
}
