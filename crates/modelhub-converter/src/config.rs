//! Configuration for the conversion subsystem.
//!
//! Supports auto-discovery of the FBX2glTF executable (tools directory next
//! to the running binary, then PATH) when no explicit path is configured.

use crate::error::ConversionError;
use crate::locator::{ConverterInstallation, ConverterLocator, DiscoveryMethod};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};
use validator::Validate;

/// How tint failures that are not caused by an unreadable GLB are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TintFailurePolicy {
    /// Log, record on the outcome, and return the untinted GLB.
    #[default]
    Lenient,
    /// Fail the conversion.
    Strict,
}

/// Configuration for the FBX2glTF-based converter.
///
/// If `converter_path` is empty, the converter is located automatically:
/// 1. `tools/` next to the running executable
/// 2. System PATH
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Path to the FBX2glTF executable (or a directory containing it).
    ///
    /// If empty, auto-discovery is attempted.
    pub converter_path: PathBuf,

    /// Argument template. `{input}` is replaced by the source file and
    /// `{output}` by the scratch directory.
    #[validate(length(min = 1))]
    pub converter_args: Vec<String>,

    /// Timeout in seconds for a single converter invocation.
    #[validate(range(min = 30, max = 7200))]
    pub timeout_seconds: u64,

    /// Global limit for concurrently running converter processes.
    #[validate(range(min = 1, max = 16))]
    pub max_concurrent_conversions: usize,

    /// Treatment of unexpected tint failures.
    pub tint_failure_policy: TintFailurePolicy,

    /// Whether to capture converter stdout/stderr for diagnostics.
    pub capture_output: bool,

    /// Minimum final GLB size (bytes) to consider conversion successful.
    pub min_output_bytes: u64,

    /// Cached discovery result (not serialized, populated at runtime).
    #[serde(skip)]
    pub discovered_installation: Option<ConverterInstallation>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            converter_path: PathBuf::new(),
            converter_args: default_converter_args(),
            timeout_seconds: default_timeout_seconds(),
            max_concurrent_conversions: default_max_concurrent_conversions(),
            tint_failure_policy: TintFailurePolicy::default(),
            capture_output: true,
            min_output_bytes: default_min_output_bytes(),
            discovered_installation: None,
        }
    }
}

fn default_converter_args() -> Vec<String> {
    ["-i", "{input}", "-o", "{output}"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_timeout_seconds() -> u64 {
    600
}

fn default_max_concurrent_conversions() -> usize {
    4
}

fn default_min_output_bytes() -> u64 {
    // GLB header (12) + JSON chunk header (8)
    20
}

impl ConverterConfig {
    /// Resolve the effective converter executable path.
    ///
    /// An explicitly configured path is validated and used; otherwise
    /// auto-discovery runs. The result is cached in `discovered_installation`.
    pub fn resolve_converter_path(&mut self) -> Result<PathBuf, ConversionError> {
        if !self.converter_path.as_os_str().is_empty() {
            info!(
                path = %self.converter_path.display(),
                "Using explicitly configured converter path"
            );

            match ConverterLocator::from_explicit_path(&self.converter_path) {
                Ok(installation) => {
                    let path = installation.executable.clone();
                    self.converter_path = path.clone();
                    self.discovered_installation = Some(installation);
                    return Ok(path);
                }
                Err(e) => {
                    warn!(
                        configured_path = %self.converter_path.display(),
                        error = %e,
                        "Configured converter path is invalid"
                    );
                    return Err(ConversionError::ToolMissing {
                        path: self.converter_path.clone(),
                    });
                }
            }
        }

        info!("Converter path not configured, attempting auto-discovery...");

        match ConverterLocator::discover() {
            Ok(installation) => {
                info!(
                    path = %installation.executable.display(),
                    method = ?installation.discovery_method,
                    "Auto-discovered FBX2glTF"
                );
                let path = installation.executable.clone();
                self.converter_path = path.clone();
                self.discovered_installation = Some(installation);
                Ok(path)
            }
            Err(e) => {
                warn!(error = %e, "FBX2glTF auto-discovery failed");
                Err(ConversionError::ToolMissing {
                    path: PathBuf::from(ConverterLocator::executable_names()[0]),
                })
            }
        }
    }

    /// Whether the converter path is set and exists on disk.
    pub fn is_converter_resolved(&self) -> bool {
        !self.converter_path.as_os_str().is_empty() && self.converter_path.exists()
    }

    /// Human-readable summary of the converter configuration.
    pub fn converter_summary(&self) -> String {
        match &self.discovered_installation {
            Some(inst) => {
                let method = match inst.discovery_method {
                    DiscoveryMethod::ExplicitConfig => "explicit config",
                    DiscoveryMethod::ToolsDirectory => "tools directory",
                    DiscoveryMethod::SystemPath => "system PATH",
                };
                format!("{} (found via {})", inst.executable.display(), method)
            }
            None => {
                if self.converter_path.as_os_str().is_empty() {
                    "Not configured, auto-discovery not yet attempted".to_string()
                } else {
                    format!(
                        "Configured: {} (not validated)",
                        self.converter_path.display()
                    )
                }
            }
        }
    }
}
