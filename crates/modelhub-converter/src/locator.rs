//! FBX2glTF executable discovery and validation.
//!
//! Locates the converter by checking:
//! 1. An explicitly configured path (file, or directory containing the binary)
//! 2. A `tools/` directory next to the running executable
//! 3. The system PATH

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Executable names probed in every candidate directory.
#[cfg(windows)]
const CONVERTER_NAMES: &[&str] = &["FBX2glTF.exe", "fbx2gltf.exe", "FBX2glTF", "fbx2gltf"];
#[cfg(not(windows))]
const CONVERTER_NAMES: &[&str] = &["FBX2glTF", "fbx2gltf"];

/// Directory next to the running binary that may bundle the converter.
const TOOLS_DIR: &str = "tools";

/// Errors from converter discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The converter was not found anywhere.
    #[error("FBX2glTF not found. Searched: {searched}")]
    NotFound {
        /// Human-readable list of searched locations.
        searched: String,
    },

    /// A directory was given but contains no converter binary.
    #[error("Directory {dir} does not contain any of {names:?}")]
    BinaryMissing {
        /// The directory that was searched.
        dir: PathBuf,
        /// The names that were probed.
        names: Vec<String>,
    },

    /// The binary exists but is unusable.
    #[error("Converter at {path} is unusable: {reason}")]
    Unusable {
        /// The offending file.
        path: PathBuf,
        /// Description of the problem.
        reason: String,
    },
}

/// Information about a discovered converter installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterInstallation {
    /// Full path to the converter executable.
    pub executable: PathBuf,
    /// Directory the executable lives in.
    pub install_dir: PathBuf,
    /// How the installation was discovered.
    pub discovery_method: DiscoveryMethod,
}

/// How the converter was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    /// Explicitly configured by the user.
    ExplicitConfig,
    /// Found in `tools/` next to the running executable.
    ToolsDirectory,
    /// Found via the system PATH environment variable.
    SystemPath,
}

/// FBX2glTF discovery engine.
pub struct ConverterLocator;

impl ConverterLocator {
    /// Attempt to discover the converter without explicit configuration.
    ///
    /// Searches the tools directory, then PATH. Returns the first hit.
    pub fn discover() -> Result<ConverterInstallation, DiscoveryError> {
        info!("Searching for FBX2glTF...");

        if let Some(tools_dir) = Self::tools_dir() {
            if let Some(executable) = Self::find_in_dir(&tools_dir) {
                info!(path = %executable.display(), "Found FBX2glTF in tools directory");
                return Ok(Self::installation(executable, DiscoveryMethod::ToolsDirectory));
            }
            debug!(dir = %tools_dir.display(), "No converter in tools directory, trying PATH");
        }

        let path_var = std::env::var_os("PATH").unwrap_or_default();
        if let Some(executable) = Self::find_on_path(&path_var) {
            info!(path = %executable.display(), "Found FBX2glTF in system PATH");
            return Ok(Self::installation(executable, DiscoveryMethod::SystemPath));
        }

        Err(DiscoveryError::NotFound {
            searched: format!(
                "{}, PATH",
                Self::tools_dir()
                    .map(|d| d.display().to_string())
                    .unwrap_or_else(|| TOOLS_DIR.to_string())
            ),
        })
    }

    /// Create an installation from an explicitly configured path.
    ///
    /// Accepts the executable itself or a directory containing it.
    pub fn from_explicit_path(path: &Path) -> Result<ConverterInstallation, DiscoveryError> {
        if path.is_file() {
            let installation = Self::installation(path.to_path_buf(), DiscoveryMethod::ExplicitConfig);
            Self::validate(&installation)?;
            return Ok(installation);
        }

        if path.is_dir() {
            return Self::find_in_dir(path)
                .map(|exe| Self::installation(exe, DiscoveryMethod::ExplicitConfig))
                .ok_or_else(|| DiscoveryError::BinaryMissing {
                    dir: path.to_path_buf(),
                    names: CONVERTER_NAMES.iter().map(|s| s.to_string()).collect(),
                });
        }

        Err(DiscoveryError::NotFound {
            searched: path.display().to_string(),
        })
    }

    /// Validate that an installation is usable: the file exists and is non-empty.
    pub fn validate(installation: &ConverterInstallation) -> Result<(), DiscoveryError> {
        let exe = &installation.executable;
        let metadata = std::fs::metadata(exe).map_err(|e| DiscoveryError::Unusable {
            path: exe.clone(),
            reason: format!("cannot read metadata: {e}"),
        })?;

        if !metadata.is_file() {
            return Err(DiscoveryError::Unusable {
                path: exe.clone(),
                reason: "not a regular file".to_string(),
            });
        }
        if metadata.len() == 0 {
            return Err(DiscoveryError::Unusable {
                path: exe.clone(),
                reason: "file is empty".to_string(),
            });
        }

        Ok(())
    }

    /// Executable names probed during discovery.
    pub fn executable_names() -> &'static [&'static str] {
        CONVERTER_NAMES
    }

    /// `tools/` next to the running executable, if it can be determined.
    fn tools_dir() -> Option<PathBuf> {
        let exe = std::env::current_exe().ok()?;
        exe.parent().map(|dir| dir.join(TOOLS_DIR))
    }

    /// First converter binary found directly inside `dir`.
    fn find_in_dir(dir: &Path) -> Option<PathBuf> {
        CONVERTER_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    /// First converter binary found in any `PATH` entry.
    fn find_on_path(path_var: &std::ffi::OsStr) -> Option<PathBuf> {
        std::env::split_paths(path_var)
            .filter(|dir| !dir.as_os_str().is_empty())
            .find_map(|dir| Self::find_in_dir(&dir))
    }

    fn installation(executable: PathBuf, discovery_method: DiscoveryMethod) -> ConverterInstallation {
        let install_dir = executable
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        ConverterInstallation {
            executable,
            install_dir,
            discovery_method,
        }
    }
}
