//! Job manifest
//!
//! Declarative description of a job's staging needs, consumed by the
//! `stagehand run` subcommand.

use crate::error::{IoResultExt, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Files a job reads, writes, and rewrites in place
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobManifest {
    /// Paths staged in before the job runs
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Outputs staged out after the job finishes
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
    /// Paths staged in and copied back over themselves
    #[serde(default)]
    pub modify: Vec<String>,
}

/// One produced file and any mirror destinations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Primary destination path
    pub path: String,
    /// Additional destinations receiving the same content
    #[serde(default)]
    pub mirrors: Vec<String>,
}

impl JobManifest {
    /// Load a manifest from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).with_path(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write the manifest to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents).with_path(path)?;
        Ok(())
    }

    /// Total number of files this manifest stages
    pub fn len(&self) -> usize {
        self.inputs.len() + self.outputs.len() + self.modify.len()
    }

    /// True when the manifest stages nothing
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
