// Aula backend
// Main entry point for the aula binary

use clap::Parser;

use aula_engine::cli::{Cli, Command};
use aula_engine::config::Config;
use aula_engine::handlers::{
    handle_courses, handle_doctor, handle_serve, handle_sync, OutputFormat,
};
use aula_engine::telemetry::{init_telemetry, init_telemetry_with_level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize basic telemetry first (before config is loaded)
    init_telemetry();

    tracing::info!("Aula backend v{}", env!("CARGO_PKG_VERSION"));

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // Re-initialize telemetry with the flag- or config-driven log level
    // (only takes effect if RUST_LOG env var is not set)
    let log_level = cli
        .log
        .clone()
        .unwrap_or_else(|| config.core.log_level.clone());
    init_telemetry_with_level(&log_level);

    // Handle commands
    match cli.command {
        Command::Serve => {
            tracing::info!("Starting server...");
            handle_serve(config).await
        }

        Command::Sync => {
            tracing::info!("Running triggered sync pass...");
            handle_sync(config, format).await
        }

        Command::Courses => {
            tracing::info!("Listing provider courses...");
            handle_courses(config, format).await
        }

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(config, format).await
        }
    }
}
