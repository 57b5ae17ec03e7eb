//! Locating the converter's output.
//!
//! FBX2glTF writes into `<scratch>_out` rather than the directory it was
//! given, and depending on version and flags leaves either a `.glb` or a
//! `.gltf` with companion buffers. Some builds write straight into the
//! scratch directory instead.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::ConversionError;
use crate::filesystem::FsUtils;
use crate::models::ConverterOutput;

/// Suffix FBX2glTF appends to the requested output directory.
pub const OUTPUT_DIR_SUFFIX: &str = "_out";

/// The directory FBX2glTF actually writes to for a given scratch directory.
pub fn output_dir_for(scratch_dir: &Path) -> PathBuf {
    let mut name: OsString = scratch_dir.as_os_str().to_os_string();
    name.push(OUTPUT_DIR_SUFFIX);
    PathBuf::from(name)
}

/// Classify a directory listing. A `.glb` wins over a `.gltf`; within a kind
/// the first entry in listing order is chosen.
pub fn classify(entries: &[PathBuf]) -> ConverterOutput {
    if let Some(glb) = entries.iter().find(|p| FsUtils::has_extension(p, "glb")) {
        return ConverterOutput::Glb(glb.clone());
    }
    if let Some(gltf) = entries.iter().find(|p| FsUtils::has_extension(p, "gltf")) {
        return ConverterOutput::GltfBin(gltf.clone());
    }
    ConverterOutput::NotFound
}

/// Result of output discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    /// The chosen artifact. Never `NotFound`.
    pub output: ConverterOutput,
    /// Set when the artifact came from the scratch directory itself.
    pub degraded: bool,
}

/// Find the converter output for `scratch_dir`.
///
/// Looks in `<scratch>_out` first. If that directory is missing, falls back
/// to the scratch directory itself and marks the result as degraded.
pub async fn discover(scratch_dir: &Path) -> Result<Discovered, ConversionError> {
    let out_dir = output_dir_for(scratch_dir);

    if tokio::fs::try_exists(&out_dir).await? {
        let entries = FsUtils::list_files(&out_dir).await?;
        debug!(dir = %out_dir.display(), count = entries.len(), "Listed converter output");

        return match classify(&entries) {
            ConverterOutput::NotFound => Err(ConversionError::UnexpectedOutputStructure {
                dir: out_dir,
                entries: entries
                    .iter()
                    .filter_map(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .collect(),
            }),
            output => Ok(Discovered {
                output,
                degraded: false,
            }),
        };
    }

    let entries = match FsUtils::list_files(scratch_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    match classify(&entries) {
        ConverterOutput::NotFound => Err(ConversionError::NoOutputProduced {
            scratch_dir: scratch_dir.to_path_buf(),
        }),
        output => {
            warn!(
                scratch_dir = %scratch_dir.display(),
                "Converter wrote output into the scratch directory instead of {}",
                out_dir.display()
            );
            Ok(Discovered {
                output,
                degraded: true,
            })
        }
    }
}
