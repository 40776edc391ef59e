//! ESP provisioning CLI entry point

use clap::Parser;
use tracing::{error, info};

use espprov_cli::{cli::Cli, commands::CommandDispatcher, config::CliConfig, error::Result};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_configuration(&cli)?;
    let dispatcher = CommandDispatcher::new(config);

    if let Err(e) = dispatcher.execute(cli.command).await {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> Result<CliConfig> {
    if let Some(config_path) = &cli.config {
        info!("Loading configuration from: {}", config_path);
        CliConfig::load_from_file(config_path)
    } else {
        Ok(CliConfig::default())
    }
}
