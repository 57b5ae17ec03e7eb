//! Storage directory configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where converted models are written and where scratch work happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory receiving final `.glb` artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Root for per-conversion scratch workspaces. Falls back to the
    /// system temp directory when unset.
    #[serde(default)]
    pub scratch_root: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            scratch_root: None,
        }
    }
}

impl StorageConfig {
    /// Resolve the effective scratch root directory.
    pub fn effective_scratch_root(&self) -> PathBuf {
        self.scratch_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("modelhub"))
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/converted")
}
