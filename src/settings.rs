//! Root configuration tree for the `modelhub` binary.

use serde::{Deserialize, Serialize};

use modelhub_converter::ConverterConfig;
use modelhub_core::config::load_layered;
use modelhub_core::config::logging::LoggingConfig;
use modelhub_core::config::storage::StorageConfig;
use modelhub_core::AppResult;

/// Environment variable naming the base config file.
pub const CONFIG_PATH_VAR: &str = "MODELHUB_CONFIG";
/// Environment variable naming the overlay environment.
pub const ENV_VAR: &str = "MODELHUB_ENV";

const DEFAULT_CONFIG_PATH: &str = "config/default";
const DEFAULT_ENV: &str = "development";

/// Everything the binary reads from configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Logging section.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Output and scratch directories.
    #[serde(default)]
    pub storage: StorageConfig,
    /// FBX2glTF settings.
    #[serde(default)]
    pub converter: ConverterConfig,
}

impl Settings {
    /// Load settings from `path` (or `MODELHUB_CONFIG`), the `MODELHUB_ENV`
    /// overlay and `MODELHUB__` environment variables.
    pub fn load(path: Option<&str>) -> AppResult<Self> {
        let env_path = std::env::var(CONFIG_PATH_VAR).ok();
        let base = path
            .or(env_path.as_deref())
            .unwrap_or(DEFAULT_CONFIG_PATH);
        let env = std::env::var(ENV_VAR).unwrap_or_else(|_| DEFAULT_ENV.to_string());

        load_layered(base, &env)
    }
}
