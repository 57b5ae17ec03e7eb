//! Filesystem utilities for the conversion pipeline.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ConversionError;

/// Filesystem utility functions.
pub struct FsUtils;

impl FsUtils {
    /// Prefix of every scratch directory name.
    pub const SCRATCH_PREFIX: &'static str = "fbx2glb_";

    /// Subdirectory of the output directory reserved for extracted textures.
    pub const TEXTURES_DIR: &'static str = "textures";

    /// Destination of the final artifact: `<output_dir>/<source stem>.glb`.
    pub fn final_glb_path(source: &Path, output_dir: &Path) -> Result<PathBuf, ConversionError> {
        let stem = source
            .file_stem()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConversionError::InvalidSource {
                path: source.to_path_buf(),
            })?;

        let mut name = stem.to_os_string();
        name.push(".glb");
        Ok(output_dir.join(name))
    }

    /// Unique scratch directory name: `fbx2glb_<UUIDv7>`.
    pub fn scratch_dir_name() -> String {
        format!("{}{}", Self::SCRATCH_PREFIX, Uuid::now_v7().simple())
    }

    /// Case-insensitive extension check. `ext` is given without the dot.
    pub fn has_extension(path: &Path, ext: &str) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Create the output directory and its `textures` subdirectory.
    pub async fn ensure_output_dirs(output_dir: &Path) -> Result<(), ConversionError> {
        tokio::fs::create_dir_all(output_dir.join(Self::TEXTURES_DIR)).await?;
        Ok(())
    }

    /// Regular files directly inside `dir`, sorted by path.
    pub async fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Recursively remove `dir`. Missing directories are not an error; other
    /// failures are logged and reported as `false`.
    pub async fn remove_dir_best_effort(dir: &Path) -> bool {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => {
                debug!(dir = %dir.display(), "Removed scratch directory");
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                warn!(
                    dir = %dir.display(),
                    error = %e,
                    "Failed to clean up scratch directory"
                );
                false
            }
        }
    }

    /// Remove a file. Missing files are not an error; other failures are
    /// logged and reported as `false`.
    pub async fn remove_file_best_effort(path: &Path) -> bool {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed file");
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove file");
                false
            }
        }
    }

    /// Size of a file in bytes.
    pub async fn file_size(path: &Path) -> Result<u64, ConversionError> {
        Ok(tokio::fs::metadata(path).await?.len())
    }

    /// Hidden, unique sibling of `dest` used to stage a write.
    pub fn staging_path(dest: &Path) -> PathBuf {
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        dest.with_file_name(format!(".{}.{}.tmp", name, Uuid::now_v7().simple()))
    }

    /// Write `bytes` to a staging sibling and rename it over `dest`.
    ///
    /// `dest` is either left untouched or fully replaced.
    pub async fn write_atomic(dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let staging = Self::staging_path(dest);
        let result = async {
            tokio::fs::write(&staging, bytes).await?;
            tokio::fs::rename(&staging, dest).await
        }
        .await;

        if result.is_err() {
            Self::remove_file_best_effort(&staging).await;
        }
        result
    }

    /// Copy `from` to a staging sibling of `dest` and rename it into place.
    pub async fn copy_atomic(from: &Path, dest: &Path) -> std::io::Result<u64> {
        let staging = Self::staging_path(dest);
        let result = async {
            let copied = tokio::fs::copy(from, &staging).await?;
            tokio::fs::rename(&staging, dest).await?;
            Ok(copied)
        }
        .await;

        if result.is_err() {
            Self::remove_file_best_effort(&staging).await;
        }
        result
    }
}

/// Owns a conversion's scratch directories and removes them when dropped.
///
/// The normal path calls [`ScratchGuard::cleanup`]; the `Drop` impl covers
/// conversion futures that are dropped before reaching it.
#[derive(Debug)]
pub struct ScratchGuard {
    dirs: Vec<PathBuf>,
    armed: bool,
}

impl ScratchGuard {
    /// Guard `dirs`, which need not exist yet.
    pub fn new(dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            dirs: dirs.into_iter().collect(),
            armed: true,
        }
    }

    /// Guarded directories.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Remove every guarded directory, logging failures.
    pub async fn cleanup(mut self) {
        for dir in &self.dirs {
            FsUtils::remove_dir_best_effort(dir).await;
        }
        self.armed = false;
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        for dir in &self.dirs {
            match std::fs::remove_dir_all(dir) {
                Ok(()) => debug!(dir = %dir.display(), "Removed abandoned scratch directory"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(
                    dir = %dir.display(),
                    error = %e,
                    "Failed to clean up abandoned scratch directory"
                ),
            }
        }
    }
}
