//! quickcal CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use quickcal_client::cli::{Cli, Command, ConfigAction};
use quickcal_client::commands;
use quickcal_client::config::ClientConfig;
use quickcal_client::error::{ClientError, ClientResult};
use quickcal_core::{TracingConfig, init_tracing};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = TracingConfig::for_cli(cli.debug).with_format(cli.log_format);
    if let Err(e) = init_tracing(&tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);
    let config = if cli.config.is_some() {
        ClientConfig::load_from(&config_path).map_err(ClientError::Config)?
    } else {
        ClientConfig::load().map_err(ClientError::Config)?
    };

    let google = config
        .google
        .to_google_config(cli.credentials_dir.as_deref())
        .with_open_browser(!cli.no_browser);

    match cli.command {
        Command::Add {
            title,
            start,
            end,
            description,
        } => commands::add::add(title, &start, &end, description, &config, &google).await,
        Command::Auth { force } => commands::auth::auth(&google, force).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => {
                commands::config::validate(&config, cli.credentials_dir.as_deref())
            }
            ConfigAction::Path => commands::config::path(&config_path, &google),
        },
    }
}
