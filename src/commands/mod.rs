//! CLI command definitions and dispatch.

pub mod config;
pub mod convert;
pub mod inspect;
pub mod locate;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use crate::settings::Settings;
use modelhub_core::error::AppError;

/// ModelHub: FBX → GLB conversion
#[derive(Debug, Parser)]
#[command(name = "modelhub", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (defaults to $MODELHUB_CONFIG or config/default)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert FBX files to GLB
    Convert(convert::ConvertArgs),
    /// Inspect a GLB file
    Inspect(inspect::InspectArgs),
    /// Locate the FBX2glTF executable
    Locate,
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, settings: Settings) -> Result<(), AppError> {
        match &self.command {
            Commands::Convert(args) => convert::execute(args, settings, self.format).await,
            Commands::Inspect(args) => inspect::execute(args, self.format).await,
            Commands::Locate => locate::execute(settings, self.format),
            Commands::Config(args) => {
                config::execute(args, settings, self.config.as_deref(), self.format).await
            }
        }
    }
}
