//! ModelHub: FBX → GLB conversion.
//!
//! Entry point that loads configuration, initializes logging and dispatches
//! the requested command.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

mod commands;
mod output;
mod settings;

use commands::Cli;
use modelhub_core::config::logging::LoggingConfig;
use settings::Settings;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&settings.logging);
    tracing::debug!("ModelHub v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = cli.execute(settings).await {
        output::print_error(&e.to_string());
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
