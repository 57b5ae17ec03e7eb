//! # ModelHub Converter
//!
//! Converts uploaded FBX models into single-container GLB files using the
//! FBX2glTF command-line tool as the conversion engine.
//!
//! ## Pipeline
//!
//! 1. FBX2glTF is run against a private scratch directory.
//! 2. Its output is located in `<scratch>_out` (or, degraded, the scratch
//!    directory itself) and classified as GLB or GLTF + BIN.
//! 3. The artifact is normalized to `<output_dir>/<stem>.glb`, re-encoding
//!    GLTF + BIN into one binary container when needed.
//! 4. An optional material tint is applied.
//! 5. Scratch directories are removed on every path.

pub mod config;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod filesystem;
pub mod glb;
pub mod inspect;
pub mod locator;
pub mod metrics;
pub mod models;
pub mod processor;
pub mod repackage;
pub mod tint;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{ConverterConfig, TintFailurePolicy};
pub use error::ConversionError;
pub use locator::ConverterLocator;
pub use models::{
    ArtifactKind, ConversionOutcome, ConversionRequest, ConverterOutput, Tint, TintOutcome,
};
pub use processor::ConversionProcessor;
pub use tint::{ColorApplier, MaterialTint, TintError};
