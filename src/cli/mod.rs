use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "msgshield")]
#[command(about = "DLP gateway for customer-support messaging - masks and vaults sensitive data")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "msgshield.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway server
    Start,
    /// Show processing statistics
    Status,
    /// View the message log
    Logs {
        /// Show last N entries
        #[arg(long, default_value = "50")]
        tail: usize,
        /// Export the log instead of printing a table
        #[arg(long)]
        export: bool,
        /// Export format (json or csv)
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Scan a text locally and print findings and the masked result
    Scan {
        /// The text to scan
        text: String,
    },
    /// Show the active pattern catalog
    Patterns,
    /// Initialize msgshield configuration and database
    Init,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the current configuration
    Show,
    /// Apply a config template
    Template {
        /// Template name (e.g., default, monitor, strict)
        name: String,
    },
}
