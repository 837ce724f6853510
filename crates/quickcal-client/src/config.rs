//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/quickcal/config.toml` by default. Every key is optional:
//!
//! ```toml
//! [google]
//! credentials_dir = "/home/me/.config/quickcal"
//! token_file = "token.json"
//! client_secret_file = "client_secret.json"
//! time_zone = "Asia/Tokyo"
//! timeout_secs = 30
//! ```
//!
//! `token_file` and `client_secret_file` are resolved against
//! `credentials_dir` unless absolute.

use std::path::{Path, PathBuf};
use std::time::Duration;

use quickcal_core::DEFAULT_TIME_ZONE;
use quickcal_google::GoogleConfig;
use serde::{Deserialize, Serialize};

/// Configuration for the quickcal client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Google Calendar settings.
    pub google: GoogleSettings,
}

/// Google Calendar settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// Directory holding the token and client secret files.
    pub credentials_dir: Option<PathBuf>,

    /// Token file name or path.
    pub token_file: Option<PathBuf>,

    /// Client secret file name or path.
    pub client_secret_file: Option<PathBuf>,

    /// IANA time zone attached to event start and end times.
    pub time_zone: String,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            credentials_dir: None,
            token_file: None,
            client_secret_file: None,
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            timeout_secs: GoogleConfig::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {}", path.display(), e))?;
        toml::from_str(&content)
            .map_err(|e| format!("failed to parse config {}: {}", path.display(), e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quickcal")
    }
}

impl GoogleSettings {
    /// Returns the credentials directory, preferring `override_dir`.
    pub fn credentials_dir(&self, override_dir: Option<&Path>) -> PathBuf {
        override_dir
            .map(Path::to_path_buf)
            .or_else(|| self.credentials_dir.clone())
            .unwrap_or_else(GoogleConfig::default_credentials_dir)
    }

    /// Builds the configuration used for session acquisition.
    pub fn to_google_config(&self, override_dir: Option<&Path>) -> GoogleConfig {
        let dir = self.credentials_dir(override_dir);
        let mut config =
            GoogleConfig::in_dir(&dir).with_timeout(Duration::from_secs(self.timeout_secs));

        if let Some(ref file) = self.token_file {
            config = config.with_token_path(dir.join(file));
        }
        if let Some(ref file) = self.client_secret_file {
            config = config.with_client_secret_path(dir.join(file));
        }

        config
    }

    /// Checks that `time_zone` is a known IANA name.
    pub fn validate_time_zone(&self) -> Result<chrono_tz::Tz, String> {
        self.time_zone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| format!("unknown time zone '{}'", self.time_zone))
    }

    /// Validates the settings.
    pub fn validate(&self, override_dir: Option<&Path>) -> Result<(), String> {
        self.validate_time_zone()?;
        self.to_google_config(override_dir).validate()
    }
}
