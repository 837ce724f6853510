//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use quickcal_core::LogFormat;

/// quickcal - Add an event to your Google Calendar
#[derive(Debug, Parser)]
#[command(name = "quickcal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "QUICKCAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding token.json and client_secret.json
    #[arg(long, env = "QUICKCAL_CREDENTIALS_DIR")]
    pub credentials_dir: Option<PathBuf>,

    /// Print the authorization URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Log output format: compact, pretty or json
    #[arg(long, default_value = "compact")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add an event to the primary calendar and print its link
    Add {
        /// Event title
        #[arg(long, short)]
        title: String,

        /// Start time, e.g. 2024-06-01T10:00
        #[arg(long, short)]
        start: String,

        /// End time, e.g. 2024-06-01T11:00
        #[arg(long, short)]
        end: String,

        /// Event description
        #[arg(long, short)]
        description: Option<String>,
    },

    /// Authorize access to Google Calendar and store the token
    Auth {
        /// Discard the stored token and authorize again
        #[arg(long, short)]
        force: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration and credential file paths
    Path,
}
