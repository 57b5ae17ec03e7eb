//! Unified error type for the conversion pipeline.
//!
//! Every fatal pipeline failure is a `ConversionError` naming the stage that
//! failed and the path involved. Recoverable conditions (converter warnings,
//! unreadable-GLB tint failures, cleanup failures) never surface here; they
//! are recorded on the `ConversionOutcome` instead.

use modelhub_core::error::AppError;
use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for all conversion operations.
#[derive(Debug, Error)]
pub enum ConversionError {
    // --- Request validation ---
    /// Source file does not exist or is not a regular file.
    #[error("Source file not found: {path}")]
    SourceNotFound {
        /// The path that was requested.
        path: PathBuf,
    },

    /// Source path has no usable file stem for naming the output.
    #[error("Cannot derive output name from source path: {path}")]
    InvalidSource {
        /// The offending source path.
        path: PathBuf,
    },

    /// Tint value could not be parsed or is out of range.
    #[error("Invalid tint '{value}': {reason}")]
    InvalidTint {
        /// The raw input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    // --- Converter process ---
    /// Converter executable not found at the configured or discovered path.
    #[error("FBX2glTF executable not found: {path}")]
    ToolMissing {
        /// The configured path that doesn't exist.
        path: PathBuf,
    },

    /// Converter process could not be started.
    #[error("Failed to launch converter {path}: {source}")]
    ProcessLaunch {
        /// Executable that failed to start.
        path: PathBuf,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// Converter process timed out and was killed.
    #[error("Converter timed out after {timeout_seconds}s")]
    ConverterTimeout {
        /// The timeout duration that was exceeded.
        timeout_seconds: u64,
    },

    /// Conversion was cancelled via cancellation token.
    #[error("Conversion was cancelled")]
    Cancelled,

    // --- Output discovery ---
    /// Neither `<scratch>_out` nor the scratch directory held any model file.
    #[error("FBX conversion failed: no output directory or files found under {scratch_dir}")]
    NoOutputProduced {
        /// Scratch directory handed to the converter.
        scratch_dir: PathBuf,
    },

    /// The `_out` directory exists but holds neither a `.glb` nor a `.gltf`.
    #[error("FBX conversion failed: no GLTF or GLB file in {dir} (found: {entries:?})")]
    UnexpectedOutputStructure {
        /// The output directory that was listed.
        dir: PathBuf,
        /// File names that were present.
        entries: Vec<String>,
    },

    // --- Normalization ---
    /// Reading or writing the GLTF → GLB conversion failed.
    #[error("Failed to convert GLTF to GLB: {path}: {reason}")]
    Repackaging {
        /// The `.gltf` being converted.
        path: PathBuf,
        /// Description of the failing step.
        reason: String,
    },

    /// Copying a converter-produced GLB to its destination failed.
    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        /// GLB produced by the converter.
        from: PathBuf,
        /// Final destination.
        to: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Final artifact is smaller than the configured minimum.
    #[error("Output file is too small ({size} bytes): {path}")]
    OutputTooSmall {
        /// Final GLB path.
        path: PathBuf,
        /// Observed size.
        size: u64,
    },

    // --- Tint ---
    /// Tint failed for a reason other than an unreadable GLB (strict policy only).
    #[error("Failed to apply tint to {path}: {reason}")]
    TintFailed {
        /// Final GLB path.
        path: PathBuf,
        /// Underlying tint error message.
        reason: String,
    },

    // --- Concurrency ---
    /// Semaphore was closed unexpectedly.
    #[error("Internal semaphore error: {reason}")]
    SemaphoreClosed {
        /// Description of which semaphore failed.
        reason: String,
    },

    // --- Generic errors ---
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tokio task join error.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ConversionError {
    /// Short name of the pipeline stage that produced this error.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::SourceNotFound { .. } | Self::InvalidSource { .. } | Self::InvalidTint { .. } => {
                "validation"
            }
            Self::ToolMissing { .. }
            | Self::ProcessLaunch { .. }
            | Self::ConverterTimeout { .. }
            | Self::Cancelled => "converting",
            Self::NoOutputProduced { .. } | Self::UnexpectedOutputStructure { .. } => "discovery",
            Self::Repackaging { .. } | Self::Copy { .. } | Self::OutputTooSmall { .. } => {
                "normalizing"
            }
            Self::TintFailed { .. } => "tinting",
            Self::SemaphoreClosed { .. } | Self::Io(_) | Self::Join(_) => "internal",
        }
    }
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        match &err {
            ConversionError::SourceNotFound { .. } => AppError::not_found(err.to_string()),
            ConversionError::InvalidSource { .. } | ConversionError::InvalidTint { .. } => {
                AppError::validation(err.to_string())
            }
            ConversionError::ToolMissing { .. } => AppError::configuration(err.to_string()),
            ConversionError::ProcessLaunch { .. } | ConversionError::ConverterTimeout { .. } => {
                AppError::external_service(err.to_string())
            }
            ConversionError::Cancelled => AppError::conflict(err.to_string()),
            ConversionError::SemaphoreClosed { .. } => {
                AppError::service_unavailable(err.to_string())
            }
            _ => AppError::internal(err.to_string()),
        }
    }
}
