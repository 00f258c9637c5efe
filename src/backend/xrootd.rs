//! Xrootd object-store backend
//!
//! Narrow wrapper around the `xrdcp` and `xrdfs` command-line clients.
//! Output is captured, exit status checked, and stderr carried into typed
//! errors so callers never scrape log text to classify a failure.

use super::Backend;
use crate::error::{Result, StageError};
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tracing::{debug, info, warn};

/// Environment variable pointing at the directory holding the xrootd CLI
/// binaries; they are looked up on `PATH` when unset
pub const XROOTD_BIN_ENV: &str = "STAGEHAND_XROOTD_BIN";

/// Backend for `root://` paths, backed by the xrootd CLI tools
#[derive(Debug, Clone)]
pub struct XrootdBackend {
    xrdcp: PathBuf,
    xrdfs: PathBuf,
}

impl Default for XrootdBackend {
    fn default() -> Self {
        match std::env::var_os(XROOTD_BIN_ENV) {
            Some(dir) => {
                let dir = PathBuf::from(dir);
                Self {
                    xrdcp: dir.join("xrdcp"),
                    xrdfs: dir.join("xrdfs"),
                }
            }
            None => Self {
                xrdcp: PathBuf::from("xrdcp"),
                xrdfs: PathBuf::from("xrdfs"),
            },
        }
    }
}

/// Split `root://host//abs/path` into the server and the absolute path
pub fn split_url(url: &str) -> Result<(String, String)> {
    let rest = url
        .strip_prefix("root://")
        .ok_or_else(|| StageError::InvalidRemotePath(url.to_string()))?;
    let (host, path) = rest
        .split_once('/')
        .ok_or_else(|| StageError::InvalidRemotePath(url.to_string()))?;
    if host.is_empty() || path.is_empty() {
        return Err(StageError::InvalidRemotePath(url.to_string()));
    }
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    Ok((host.to_string(), path))
}

/// True when stderr describes a missing file rather than a real fault.
/// The server reports absence as error 3011.
fn is_absent(stderr: &str) -> bool {
    stderr.contains("[3011]") || stderr.to_ascii_lowercase().contains("no such file")
}

impl XrootdBackend {
    /// Create a backend with binary locations from the environment
    pub fn new() -> Self {
        Self::default()
    }

    fn run(&self, mut cmd: Command) -> Result<Output> {
        let command = format!("{cmd:?}");
        debug!(%command, "executing");
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| StageError::CommandLaunch { command, source })
    }

    fn remote_error(&self, cmd_name: &str, output: &Output) -> StageError {
        StageError::RemoteCommand {
            command: cmd_name.to_string(),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    fn xrdfs(&self, host: &str, args: &[&str]) -> Result<Output> {
        let mut cmd = Command::new(&self.xrdfs);
        cmd.arg(host).args(args);
        self.run(cmd)
    }
}

impl Backend for XrootdBackend {
    fn name(&self) -> &'static str {
        "xrootd"
    }

    fn copy(&self, from: &str, to: &str) -> Result<()> {
        // xrdcp refuses blind overwrites: a plain copy onto an existing
        // file fails, and --force on a fresh file has misbehaved on full
        // servers. Plain attempt first, --force only on failure.
        let mut cmd = Command::new(&self.xrdcp);
        cmd.arg("--nopbar").arg(from).arg(to);
        let output = self.run(cmd)?;
        if output.status.success() {
            return Ok(());
        }
        debug!(
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "plain xrdcp failed, retrying with --force"
        );

        let mut cmd = Command::new(&self.xrdcp);
        cmd.arg("--nopbar").arg("--force").arg(from).arg(to);
        let output = self.run(cmd)?;
        if output.status.success() {
            info!(%from, %to, "xrdcp overwrite succeeded");
            Ok(())
        } else {
            Err(self.remote_error("xrdcp --force", &output))
        }
    }

    fn exists(&self, path: &str) -> bool {
        matches!(self.size(path), Ok(Some(_)))
    }

    fn size(&self, path: &str) -> Result<Option<u64>> {
        let (host, remote) = split_url(path)?;
        let output = self.xrdfs(&host, &["stat", &remote])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_absent(&stderr) {
                return Ok(None);
            }
            return Err(self.remote_error("xrdfs stat", &output));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            if let Some(value) = line.trim().strip_prefix("Size:") {
                let size = value.trim().parse::<u64>().map_err(|_| {
                    StageError::RemoteCommand {
                        command: "xrdfs stat".to_string(),
                        status: output.status.code(),
                        stderr: format!("unparseable stat line: {line}"),
                    }
                })?;
                return Ok(Some(size));
            }
        }
        Err(StageError::RemoteCommand {
            command: "xrdfs stat".to_string(),
            status: output.status.code(),
            stderr: "no Size: line in stat output".to_string(),
        })
    }

    fn make_directories(&self, path: &str, mode: u32) -> Result<()> {
        let (host, remote) = split_url(path)?;
        let mode = format!("-m{mode:o}");
        let output = self.xrdfs(&host, &["mkdir", "-p", &mode, &remote])?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // 3006: directory already exists
            if stderr.contains("[3006]") {
                return Ok(());
            }
            Err(self.remote_error("xrdfs mkdir", &output))
        }
    }

    fn mkdir_for(&self, path: &str, mode: u32) -> Result<()> {
        let (host, remote) = split_url(path)?;
        match remote.rsplit_once('/') {
            Some((parent, _)) if !parent.is_empty() => {
                self.make_directories(&format!("root://{host}/{parent}"), mode)
            }
            _ => Ok(()),
        }
    }

    fn remove_file(&self, path: &str) -> Result<bool> {
        let (host, remote) = split_url(path)?;
        let output = self.xrdfs(&host, &["rm", &remote])?;
        if output.status.success() {
            return Ok(true);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_absent(&stderr) {
            Ok(false)
        } else {
            Err(self.remote_error("xrdfs rm", &output))
        }
    }

    fn remove_directory(&self, path: &str) -> Result<()> {
        let (host, remote) = split_url(path)?;
        let output = self.xrdfs(&host, &["rmdir", &remote])?;
        if output.status.success() {
            Ok(())
        } else {
            Err(self.remote_error("xrdfs rmdir", &output))
        }
    }

    fn remove_tree(&self, path: &str) -> Result<()> {
        // Staging areas on the store are flat: list the entries, remove
        // each, then drop the directory itself.
        let (host, remote) = split_url(path)?;
        let output = self.xrdfs(&host, &["ls", &remote])?;
        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            for entry in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
                let rm = self.xrdfs(&host, &["rm", entry])?;
                if !rm.status.success() {
                    warn!(%entry, "could not remove remote entry");
                }
            }
        }
        self.remove_directory(path)
    }

    fn temp_name(&self, path: &str) -> String {
        // No temp-then-rename convention on the store; xrdcp writes are
        // already transactional on the server side.
        path.to_string()
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let (host, from_remote) = split_url(from)?;
        let (_, to_remote) = split_url(to)?;
        let output = self.xrdfs(&host, &["mv", &from_remote, &to_remote])?;
        if output.status.success() {
            Ok(())
        } else {
            Err(self.remote_error("xrdfs mv", &output))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_url() {
        let (host, path) = split_url("root://data.example.org//store/job/file.root").unwrap();
        assert_eq!(host, "data.example.org");
        assert_eq!(path, "/store/job/file.root");
    }

    #[test]
    fn test_split_url_with_port() {
        let (host, path) = split_url("root://host:1094//store/f").unwrap();
        assert_eq!(host, "host:1094");
        assert_eq!(path, "/store/f");
    }

    #[test]
    fn test_split_url_single_slash_path() {
        let (host, path) = split_url("root://host/store/f").unwrap();
        assert_eq!(host, "host");
        assert_eq!(path, "/store/f");
    }

    #[test]
    fn test_split_url_rejects_garbage() {
        assert!(split_url("/local/path").is_err());
        assert!(split_url("root://hostonly").is_err());
    }

    #[test]
    fn test_temp_name_is_identity() {
        let backend = XrootdBackend::new();
        let url = "root://host//store/f";
        assert_eq!(backend.temp_name(url), url);
    }

    #[test]
    fn test_absence_classification() {
        assert!(is_absent("[ERROR] Server responded with an error: [3011] No such file"));
        assert!(!is_absent("[ERROR] Server responded with an error: [3010] permission denied"));
    }
}
