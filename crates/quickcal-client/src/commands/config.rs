//! Configuration commands.

use std::path::Path;

use quickcal_google::GoogleConfig;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(config: &ClientConfig, config_path: &Path) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", config_path.display());
    println!("{}", toml_str);

    Ok(())
}

/// Validate the configuration.
pub fn validate(config: &ClientConfig, credentials_dir: Option<&Path>) -> ClientResult<()> {
    config
        .google
        .validate(credentials_dir)
        .map_err(ClientError::Config)?;
    let google = config.google.to_google_config(credentials_dir);

    if !google.client_secret_path.exists() && !google.token_path.exists() {
        println!(
            "warning: neither {} nor {} exists; `quickcal auth` will fail until the client secret file is in place.",
            google.token_path.display(),
            google.client_secret_path.display()
        );
    }

    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration and credential file paths.
pub fn path(config_path: &Path, google: &GoogleConfig) -> ClientResult<()> {
    println!("config: {}", config_path.display());
    println!("token: {}", google.token_path.display());
    println!("client secret: {}", google.client_secret_path.display());
    Ok(())
}
