//! Google Calendar configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{GoogleError, GoogleResult};

/// Google OAuth endpoints and API root.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_API_ROOT: &str = "https://www.googleapis.com";

/// OAuth 2.0 client credentials for Google API access.
///
/// Read from the client secret JSON downloaded from the Google Cloud console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    /// The OAuth 2.0 client ID from Google Cloud Console.
    pub client_id: String,
    /// The OAuth 2.0 client secret from Google Cloud Console.
    pub client_secret: String,
    /// Authorization endpoint declared by the file, if any.
    pub auth_uri: Option<String>,
    /// Token endpoint declared by the file, if any.
    pub token_uri: Option<String>,
}

/// Structure of Google's OAuth client secret JSON file.
///
/// Supports multiple formats:
/// 1. Google Cloud Console format with "installed" or "web" section
/// 2. Flat format with client_id and client_secret at root level
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<NestedCredentials>,
    web: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    auth_uri: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
}

impl OAuthCredentials {
    /// Creates new OAuth credentials using Google's default endpoints.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_uri: None,
            token_uri: None,
        }
    }

    /// Loads OAuth credentials from a client secret JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> GoogleResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GoogleError::configuration(format!(
                "failed to read client secret file {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses OAuth credentials from a client secret JSON string.
    pub fn from_json(json: &str) -> GoogleResult<Self> {
        let file: ClientSecretFile = serde_json::from_str(json).map_err(|e| {
            GoogleError::configuration(format!("failed to parse client secret JSON: {}", e))
        })?;

        if let Some(creds) = file.installed.or(file.web) {
            return Ok(Self {
                client_id: creds.client_id,
                client_secret: creds.client_secret,
                auth_uri: creds.auth_uri,
                token_uri: creds.token_uri,
            });
        }

        if let (Some(client_id), Some(client_secret)) = (file.client_id, file.client_secret) {
            return Ok(Self::new(client_id, client_secret));
        }

        Err(GoogleError::configuration(
            "client secret file must contain an 'installed'/'web' section or \
             'client_id'/'client_secret' at root level",
        ))
    }

    /// Validates that the credentials appear to be correctly formatted.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err("client_id should end with .apps.googleusercontent.com");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        Ok(())
    }
}

/// Endpoints used for OAuth and API calls.
///
/// Tests point these at a mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleEndpoints {
    /// OAuth consent page.
    pub auth_url: String,
    /// OAuth token endpoint, used for code exchange.
    pub token_url: String,
    /// Root of the REST APIs; the service name and version are appended.
    pub api_root: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            api_root: GOOGLE_API_ROOT.to_string(),
        }
    }
}

/// Configuration for credential acquisition and calendar access.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// Persisted token file, read and overwritten by the credential manager.
    pub token_path: PathBuf,

    /// Client secret JSON supplied by the operator.
    pub client_secret_path: PathBuf,

    /// Request timeout for OAuth and API calls.
    pub timeout: Duration,

    /// Local port for the OAuth redirect listener. `0` picks an ephemeral port.
    pub loopback_port: u16,

    /// Whether to open the consent page in a browser. When false, the URL is
    /// only printed.
    pub open_browser: bool,

    /// OAuth and API endpoints.
    pub endpoints: GoogleEndpoints,
}

impl GoogleConfig {
    /// The single scope every credential is issued and loaded for.
    pub const CALENDAR_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar";

    /// Default token file name inside the credentials directory.
    pub const DEFAULT_TOKEN_FILE: &'static str = "token.json";

    /// Default client secret file name inside the credentials directory.
    pub const DEFAULT_CLIENT_SECRET_FILE: &'static str = "client_secret.json";

    /// Environment variable overriding the credentials directory.
    pub const CREDENTIALS_DIR_ENV: &'static str = "QUICKCAL_CREDENTIALS_DIR";

    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Creates a configuration whose two files live in `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            token_path: dir.join(Self::DEFAULT_TOKEN_FILE),
            client_secret_path: dir.join(Self::DEFAULT_CLIENT_SECRET_FILE),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            loopback_port: 0,
            open_browser: true,
            endpoints: GoogleEndpoints::default(),
        }
    }

    /// Creates a configuration from `QUICKCAL_CREDENTIALS_DIR`, falling back
    /// to [`GoogleConfig::default_credentials_dir`].
    pub fn from_env() -> Self {
        let dir = std::env::var_os(Self::CREDENTIALS_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_credentials_dir);
        Self::in_dir(dir)
    }

    /// Returns the default credentials directory (`~/.config/quickcal`).
    pub fn default_credentials_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quickcal")
    }

    /// The scopes required of every credential.
    pub fn required_scopes() -> Vec<String> {
        vec![Self::CALENDAR_SCOPE.to_string()]
    }

    /// Sets the token file path.
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    /// Sets the client secret file path.
    pub fn with_client_secret_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_secret_path = path.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the loopback port for the OAuth redirect.
    pub fn with_loopback_port(mut self, port: u16) -> Self {
        self.loopback_port = port;
        self
    }

    /// Enables or disables opening the browser during authorization.
    pub fn with_open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }

    /// Overrides the OAuth and API endpoints.
    pub fn with_endpoints(mut self, endpoints: GoogleEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.token_path.as_os_str().is_empty() {
            return Err("token path must not be empty".to_string());
        }
        if self.client_secret_path.as_os_str().is_empty() {
            return Err("client secret path must not be empty".to_string());
        }
        if self.token_path == self.client_secret_path {
            return Err("token path and client secret path must differ".to_string());
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}
