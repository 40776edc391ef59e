//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan for provisioning devices and print their summaries as JSON
    Search {
        /// Device name prefix
        #[arg(default_value = "PROV_")]
        prefix: String,
        /// Security level to record for found devices (0, 1 or 2)
        #[arg(short, long, default_value_t = 1)]
        security: u8,
    },
    /// Read the unauthenticated version endpoint of a device
    Version {
        /// Advertised device name
        name: String,
    },
}
