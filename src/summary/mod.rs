//! Job summary reporting
//!
//! Collects key/value summary data for the orchestrating pipeline
//! service. Items are buffered in memory and appended to the summary
//! file in one shot; the pipeline server picks the file up after the
//! job exits and loads the values into its database.

use crate::error::{IoResultExt, Result};
use crate::runner;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Names the summary file when no explicit path is given
pub const SUMMARY_FILE_ENV: &str = "STAGEHAND_SUMMARY_FILE";

const DEFAULT_SUMMARY_FILE: &str = "./pipeline_summary";
const DEFAULT_PREFIX: &str = "Pipeline.";

/// Buffered key/value summary data, appended to a file on `write`.
///
/// ```no_run
/// use stagehand::summary::JobSummary;
///
/// let mut summary = JobSummary::from_env();
/// summary.add("EventsProcessed", "41669");
/// summary.add("TimeElapsed", "493829746");
/// summary.write().unwrap();
/// ```
///
/// Each item becomes one `<prefix><key>: <value>` line; the default
/// prefix `Pipeline.` matches what the pipeline server expects.
#[derive(Debug, Clone)]
pub struct JobSummary {
    filename: PathBuf,
    prefix: String,
    items: Vec<String>,
}

impl JobSummary {
    /// Create a summary writing to `filename` with the default prefix
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            prefix: DEFAULT_PREFIX.to_string(),
            items: Vec::new(),
        }
    }

    /// Create a summary writing to the file named by
    /// `STAGEHAND_SUMMARY_FILE`, or `./pipeline_summary` when unset
    pub fn from_env() -> Self {
        let filename = std::env::var_os(SUMMARY_FILE_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SUMMARY_FILE));
        debug!(file = %filename.display(), "summary file");
        Self::new(filename)
    }

    /// Override the line prefix; an empty prefix is allowed
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Buffer one summary datum
    pub fn add(&mut self, key: &str, value: &str) {
        self.items.push(format!("{}{}: {}\n", self.prefix, key, value));
    }

    /// Number of buffered items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing has been added
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The file this summary appends to
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Append all buffered items to the summary file
    pub fn write(&self) -> Result<()> {
        info!(file = %self.filename.display(), items = self.items.len(), "writing summary");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.filename)
            .with_path(&self.filename)?;
        for item in &self.items {
            file.write_all(item.as_bytes()).with_path(&self.filename)?;
        }
        Ok(())
    }
}

/// Register a single pipeline variable through the external `pipelineSet`
/// helper. Values beyond 1000 characters are truncated by the server.
pub fn set_variable(name: &str, value: &str) -> Result<runner::RunStatus> {
    runner::run("pipelineSet", &[name.to_string(), value.to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_items_are_prefixed_lines() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("summary");

        let mut summary = JobSummary::new(&file);
        summary.add("EventsProcessed", "41669");
        summary.add("TimeInSAA", "89334");
        summary.write().unwrap();

        let contents = std::fs::read_to_string(&file).unwrap();
        assert_eq!(
            contents,
            "Pipeline.EventsProcessed: 41669\nPipeline.TimeInSAA: 89334\n"
        );
    }

    #[test]
    fn test_write_appends_across_summaries() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("summary");

        let mut first = JobSummary::new(&file);
        first.add("A", "1");
        first.write().unwrap();

        let mut second = JobSummary::new(&file);
        second.add("B", "2");
        second.write().unwrap();

        let contents = std::fs::read_to_string(&file).unwrap();
        assert_eq!(contents, "Pipeline.A: 1\nPipeline.B: 2\n");
    }

    #[test]
    fn test_custom_prefix() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("summary");

        let mut summary = JobSummary::new(&file).with_prefix("");
        summary.add("Plain", "value");
        summary.write().unwrap();

        assert_eq!(std::fs::read_to_string(&file).unwrap(), "Plain: value\n");
    }

    #[test]
    #[serial]
    fn test_filename_from_env() {
        std::env::set_var(SUMMARY_FILE_ENV, "/tmp/test-summary-file");
        let summary = JobSummary::from_env();
        assert_eq!(summary.filename(), Path::new("/tmp/test-summary-file"));
        std::env::remove_var(SUMMARY_FILE_ENV);

        let summary = JobSummary::from_env();
        assert_eq!(summary.filename(), Path::new(DEFAULT_SUMMARY_FILE));
    }
}
