//! Error types for Google OAuth and Calendar operations.
//!
//! [`GoogleError`] is the low-level error returned by file, OAuth and HTTP
//! helpers. The two public operations each have their own error type:
//! [`SessionError`] for session acquisition and [`SubmitError`] for event
//! submission.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The category of a [`GoogleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GoogleErrorCode {
    /// Authentication failed or credentials are invalid/expired.
    AuthenticationFailed,
    /// The refresh token was rejected by the token endpoint (revoked or expired).
    InvalidGrant,
    /// Authorization failed - user lacks permission.
    AuthorizationFailed,
    /// Network error - connection failed, timeout, DNS resolution, etc.
    NetworkError,
    /// Rate limit exceeded - too many requests.
    RateLimited,
    /// Server returned an error (5xx status codes).
    ServerError,
    /// Invalid response from the server - parse error, unexpected format.
    InvalidResponse,
    /// Resource not found (404).
    NotFound,
    /// Request was invalid (400) - bad parameters, malformed request.
    BadRequest,
    /// Configuration error - missing or invalid files or settings.
    ConfigurationError,
    /// Internal error - unexpected state, bug.
    InternalError,
}

impl GoogleErrorCode {
    /// Returns a machine-readable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::InvalidGrant => "invalid_grant",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for GoogleErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while talking to Google or handling credential files.
#[derive(Debug, Error)]
pub struct GoogleError {
    code: GoogleErrorCode,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl GoogleError {
    /// Creates a new error with the given code and message.
    pub fn new(code: GoogleErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::AuthenticationFailed, message)
    }

    /// Creates an invalid grant error (refresh token revoked or expired).
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::InvalidGrant, message)
    }

    /// Creates an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::AuthorizationFailed, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::NetworkError, message)
    }

    /// Creates a rate limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::RateLimited, message)
    }

    /// Creates a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::ServerError, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::InvalidResponse, message)
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::NotFound, message)
    }

    /// Creates a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::BadRequest, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::ConfigurationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::InternalError, message)
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> GoogleErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for GoogleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for low-level Google operations.
pub type GoogleResult<T> = Result<T, GoogleError>;

/// Why a session could not be acquired.
///
/// Refresh failures never appear here: they are downgraded into a fresh
/// authorization attempt.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No usable token and no client secret file to start authorization with.
    #[error(
        "client secret file not found at {}. Download the OAuth client JSON \
         (application type \"Desktop app\") from the Google Cloud console \
         (APIs & Services > Credentials) and save it at that path.",
        .path.display()
    )]
    MissingConfiguration { path: PathBuf },

    /// The interactive authorization flow failed (denied, network, bad client file).
    #[error("authorization flow failed: {0}")]
    AuthorizationFlowFailed(#[source] GoogleError),

    /// The calendar session could not be built from a valid credential.
    #[error("failed to build calendar service: {0}")]
    ServiceConstructionFailed(#[source] GoogleError),

    /// The token file could not be read, parsed or written.
    #[error("token storage error: {0}")]
    Storage(#[source] GoogleError),
}

/// The create-event call failed.
///
/// Displays exactly as the underlying fault.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct SubmitError {
    source: GoogleError,
}

impl SubmitError {
    /// Returns the underlying fault.
    pub fn fault(&self) -> &GoogleError {
        &self.source
    }
}

impl From<GoogleError> for SubmitError {
    fn from(source: GoogleError) -> Self {
        Self { source }
    }
}
