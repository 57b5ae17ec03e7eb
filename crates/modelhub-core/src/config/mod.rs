//! Application configuration schemas.
//!
//! Configuration structs are deserialized from TOML files via the `config`
//! crate. Each sub-module represents a logical configuration section; the
//! binary composes them with crate-specific sections (such as the converter)
//! into its own root struct and loads it through [`load_layered`].

pub mod logging;
pub mod storage;

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Prefix for environment variable overrides (`MODELHUB__CONVERTER__TIMEOUT_SECONDS`).
pub const ENV_PREFIX: &str = "MODELHUB";

/// Load a configuration tree from layered sources.
///
/// Merges, in increasing priority:
/// 1. the base file at `base_path` (optional),
/// 2. an environment overlay `<dir of base_path>/<env>` (optional, any
///    supported extension),
/// 3. environment variables prefixed with `MODELHUB__`, using `__` as the
///    section separator.
pub fn load_layered<T: DeserializeOwned>(base_path: &str, env: &str) -> Result<T, AppError> {
    let overlay = Path::new(base_path)
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(env);

    tracing::debug!(
        base = base_path,
        overlay = %overlay.display(),
        "Loading layered configuration"
    );

    let config = config::Config::builder()
        .add_source(config::File::with_name(base_path).required(false))
        .add_source(config::File::with_name(&overlay.to_string_lossy()).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

    config
        .try_deserialize()
        .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
}
