//! Configuration management CLI commands.

use clap::{Args, Subcommand};
use validator::Validate;

use crate::output::{self, OutputFormat};
use crate::settings::Settings;
use modelhub_core::error::AppError;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Validate the configuration
    Validate,
    /// Generate a default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config/generated.toml")]
        output: String,
    },
}

/// Execute config commands
pub async fn execute(
    args: &ConfigArgs,
    settings: Settings,
    config_path: Option<&str>,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => match format {
            OutputFormat::Json => output::print_json(&settings),
            OutputFormat::Table => println!("{:#?}", settings),
        },
        ConfigCommand::Validate => {
            let label = config_path.unwrap_or("default");
            if let Err(e) = settings.converter.validate() {
                output::print_error(&format!("Configuration '{}' is invalid: {}", label, e));
                return Err(AppError::validation(e.to_string()));
            }

            output::print_success(&format!("Configuration '{}' is valid", label));
            output::print_kv("Log level", &settings.logging.level);
            output::print_kv("Output dir", &settings.storage.output_dir.display().to_string());
            output::print_kv(
                "Scratch root",
                &settings.storage.effective_scratch_root().display().to_string(),
            );
            output::print_kv("Converter", &settings.converter.converter_summary());
            output::print_kv(
                "Timeout",
                &format!("{} s", settings.converter.timeout_seconds),
            );
            output::print_kv(
                "Concurrency",
                &settings.converter.max_concurrent_conversions.to_string(),
            );
            if !settings.converter.is_converter_resolved() {
                output::print_warning("Converter path not set or missing; discovery runs at convert time");
            }
        }
        ConfigCommand::Generate { output: out_path } => {
            let default_config = include_str!("../../config/default.toml");

            if let Some(parent) = std::path::Path::new(out_path).parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| AppError::internal(format!("Failed to create dir: {}", e)))?;
            }

            tokio::fs::write(out_path, default_config)
                .await
                .map_err(|e| AppError::internal(format!("Failed to write config: {}", e)))?;

            output::print_success(&format!("Default config written to '{}'", out_path));
        }
    }

    Ok(())
}
