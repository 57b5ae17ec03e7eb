//! `modelhub locate`: report which FBX2glTF executable would be used.

use crate::output::{self, OutputFormat};
use crate::settings::Settings;
use modelhub_converter::ConverterLocator;
use modelhub_core::error::AppError;

/// Execute the locate command
pub fn execute(settings: Settings, format: OutputFormat) -> Result<(), AppError> {
    let mut config = settings.converter;
    config.resolve_converter_path()?;

    let Some(installation) = config.discovered_installation.as_ref() else {
        return Err(AppError::internal("Converter resolved without an installation"));
    };

    match format {
        OutputFormat::Json => output::print_json(installation),
        OutputFormat::Table => {
            output::print_success(&config.converter_summary());
            output::print_kv("Executable", &installation.executable.display().to_string());
            output::print_kv("Install dir", &installation.install_dir.display().to_string());
            output::print_kv("Probed names", &ConverterLocator::executable_names().join(", "));
        }
    }
    Ok(())
}
