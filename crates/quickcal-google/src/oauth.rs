//! OAuth 2.0 PKCE flow implementation for Google APIs.
//!
//! This module implements the Authorization Code flow with PKCE (Proof Key for
//! Code Exchange) extension, using a loopback redirect for desktop applications.
//!
//! # Flow Overview
//!
//! 1. Generate a cryptographic code verifier and its SHA-256 challenge
//! 2. Bind a local listener on an ephemeral port
//! 3. Build the authorization URL with the challenge
//! 4. Open the user's browser to Google's consent page
//! 5. User grants permission; Google redirects to our local listener
//! 6. Extract the authorization code from the redirect
//! 7. Exchange the code (with verifier) for access and refresh tokens
//!
//! The listener waits for the redirect without a timeout.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{GoogleConfig, GoogleEndpoints, OAuthCredentials};
use crate::error::{GoogleError, GoogleResult};
use crate::service::BoxFuture;
use crate::tokens::{Credential, RefreshedToken};

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// Path the loopback listener expects the redirect on.
const CALLBACK_PATH: &str = "/callback";

/// Longest request line read from a loopback connection.
const MAX_REQUEST_LINE: u64 = 8 * 1024;

const SUCCESS_PAGE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body><h1>Authorization Successful</h1>\
    <p>You can close this window and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body><h1>Authorization Failed</h1>\
    <p>You can close this window.</p></body></html>";

const NOT_FOUND_PAGE: &str = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Runs the interactive authorization flow.
pub trait Authorizer: Send + Sync {
    /// Obtains a new credential for `scopes` using the OAuth client `credentials`.
    fn authorize<'a>(
        &'a self,
        credentials: &'a OAuthCredentials,
        scopes: &'a [String],
    ) -> BoxFuture<'a, GoogleResult<Credential>>;
}

/// Exchanges a refresh token for a new access token.
pub trait TokenRefresher: Send + Sync {
    /// Refreshes `credential` using its embedded refresh token and client.
    fn refresh<'a>(&'a self, credential: &'a Credential) -> BoxFuture<'a, GoogleResult<RefreshedToken>>;
}

/// OAuth client for Google APIs.
///
/// Handles the OAuth 2.0 PKCE flow for obtaining and refreshing tokens.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http_client: reqwest::Client,
    endpoints: GoogleEndpoints,
    loopback_port: u16,
    open_browser: bool,
}

impl OAuthClient {
    /// Creates a new OAuth client.
    pub fn new(endpoints: GoogleEndpoints, timeout: Duration) -> GoogleResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                GoogleError::internal(format!("failed to create HTTP client: {}", e)).with_source(e)
            })?;

        Ok(Self {
            http_client,
            endpoints,
            loopback_port: 0,
            open_browser: true,
        })
    }

    /// Creates an OAuth client from the shared configuration.
    pub fn from_config(config: &GoogleConfig) -> GoogleResult<Self> {
        Ok(Self::new(config.endpoints.clone(), config.timeout)?
            .with_loopback_port(config.loopback_port)
            .with_open_browser(config.open_browser))
    }

    /// Sets the loopback port. `0` picks an ephemeral port.
    pub fn with_loopback_port(mut self, port: u16) -> Self {
        self.loopback_port = port;
        self
    }

    /// Enables or disables opening the browser.
    pub fn with_open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }

    /// Initiates the OAuth PKCE flow and returns the obtained credential.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The client credentials are malformed
    /// - The loopback listener cannot be bound
    /// - The user denies authorization
    /// - Token exchange fails
    pub async fn authorize(
        &self,
        credentials: &OAuthCredentials,
        scopes: &[String],
    ) -> GoogleResult<Credential> {
        let open_browser = self.open_browser;
        self.authorize_with(credentials, scopes, |url| launch_browser(url, open_browser))
            .await
    }

    /// Runs the flow, handing the consent URL to `launch` instead of a browser.
    pub async fn authorize_with<F>(
        &self,
        credentials: &OAuthCredentials,
        scopes: &[String],
        launch: F,
    ) -> GoogleResult<Credential>
    where
        F: FnOnce(&str),
    {
        credentials
            .validate()
            .map_err(|e| GoogleError::configuration(format!("invalid client credentials: {}", e)))?;

        let pkce = PkceFlow::new();

        let listener = TcpListener::bind(("127.0.0.1", self.loopback_port))
            .await
            .map_err(|e| {
                GoogleError::configuration(format!(
                    "failed to bind loopback listener on port {}: {}",
                    self.loopback_port, e
                ))
                .with_source(e)
            })?;
        let port = listener
            .local_addr()
            .map_err(|e| GoogleError::internal(format!("failed to read listener address: {}", e)))?
            .port();
        debug!("bound loopback listener on port {}", port);

        let redirect_uri = format!("http://127.0.0.1:{}{}", port, CALLBACK_PATH);
        let auth_endpoint = credentials
            .auth_uri
            .as_deref()
            .unwrap_or(&self.endpoints.auth_url);
        let auth_url = pkce.build_auth_url(auth_endpoint, &credentials.client_id, &redirect_uri, scopes);

        info!("starting OAuth flow");
        launch(&auth_url);

        let (code, received_state) = Self::wait_for_callback(&listener).await?;

        if received_state != pkce.state {
            return Err(GoogleError::authentication(
                "OAuth state mismatch - possible CSRF attack",
            ));
        }

        info!("received authorization code, exchanging for tokens...");

        self.exchange_code(credentials, &code, &pkce.verifier, &redirect_uri, scopes)
            .await
    }

    /// Refreshes an expired access token using the credential's refresh token.
    pub async fn refresh_token(&self, credential: &Credential) -> GoogleResult<RefreshedToken> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GoogleError::authentication("no refresh token available"))?;

        let params = [
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let token_response = self
            .post_token_request(&credential.token_uri, &params, "token refresh")
            .await?;

        info!("successfully refreshed access token");
        Ok(RefreshedToken {
            access_token: token_response.access_token,
            expires_in: token_response.expires_in,
            refresh_token: token_response.refresh_token,
        })
    }

    /// Exchanges an authorization code for a credential.
    async fn exchange_code(
        &self,
        credentials: &OAuthCredentials,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> GoogleResult<Credential> {
        let token_uri = credentials
            .token_uri
            .clone()
            .unwrap_or_else(|| self.endpoints.token_url.clone());

        let params = [
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let token_response = self
            .post_token_request(&token_uri, &params, "token exchange")
            .await?;

        info!("successfully obtained tokens");
        let mut credential = Credential {
            access_token: String::new(),
            refresh_token: None,
            token_uri,
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            scopes: scopes.to_vec(),
            expiry: None,
        };
        credential.apply_refresh(
            RefreshedToken {
                access_token: token_response.access_token,
                expires_in: token_response.expires_in,
                refresh_token: token_response.refresh_token,
            },
            Utc::now(),
        );
        Ok(credential)
    }

    /// Posts a form to the token endpoint and parses the response.
    async fn post_token_request(
        &self,
        token_uri: &str,
        params: &[(&str, &str)],
        what: &str,
    ) -> GoogleResult<TokenResponse> {
        let response = self
            .http_client
            .post(token_uri)
            .form(params)
            .send()
            .await
            .map_err(|e| GoogleError::network(format!("{} request failed: {}", what, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GoogleError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(token_error(what, status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| GoogleError::invalid_response(format!("invalid token response: {}", e)))
    }

    /// Accepts connections until one carries the OAuth redirect.
    ///
    /// Each connection is served on its own task, so an idle connection
    /// (e.g. a browser preconnect) cannot hold up the redirect. Handlers
    /// still pending when the redirect arrives are aborted.
    async fn wait_for_callback(listener: &TcpListener) -> GoogleResult<(String, String)> {
        let mut handlers = JoinSet::new();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("callback connection from {}", peer);
                        handlers.spawn(Self::handle_callback(stream));
                    }
                    Err(e) => warn!("failed to accept connection: {}", e),
                },
                Some(joined) = handlers.join_next(), if !handlers.is_empty() => match joined {
                    Ok(Some(result)) => return result,
                    Ok(None) => {}
                    Err(e) => warn!("callback handler failed: {}", e),
                },
            }
        }
    }

    /// Handles one HTTP request on the loopback listener.
    ///
    /// Returns `None` for requests that are not the redirect (e.g. favicon).
    async fn handle_callback(stream: TcpStream) -> Option<GoogleResult<(String, String)>> {
        let mut reader = BufReader::new(stream);
        let mut request_line = String::new();

        if (&mut reader)
            .take(MAX_REQUEST_LINE)
            .read_line(&mut request_line)
            .await
            .is_err()
        {
            return None;
        }

        let outcome = parse_callback(&request_line);
        let page = match &outcome {
            None => NOT_FOUND_PAGE,
            Some(Ok(_)) => SUCCESS_PAGE,
            Some(Err(_)) => FAILURE_PAGE,
        };

        let mut stream = reader.into_inner();
        let _ = stream.write_all(page.as_bytes()).await;
        let _ = stream.flush().await;
        let _ = stream.shutdown().await;

        outcome
    }
}

impl Authorizer for OAuthClient {
    fn authorize<'a>(
        &'a self,
        credentials: &'a OAuthCredentials,
        scopes: &'a [String],
    ) -> BoxFuture<'a, GoogleResult<Credential>> {
        Box::pin(OAuthClient::authorize(self, credentials, scopes))
    }
}

impl TokenRefresher for OAuthClient {
    fn refresh<'a>(&'a self, credential: &'a Credential) -> BoxFuture<'a, GoogleResult<RefreshedToken>> {
        Box::pin(self.refresh_token(credential))
    }
}

/// Opens the consent page, falling back to printing the URL.
fn launch_browser(url: &str, open_browser: bool) {
    debug!("authorization URL: {}", url);
    if !open_browser {
        eprintln!("\nPlease open this URL in your browser:\n\n{}\n", url);
        return;
    }
    info!("opening browser for authorization");
    if let Err(e) = open::that(url) {
        warn!("failed to open browser: {}", e);
        eprintln!("\nPlease open this URL in your browser:\n\n{}\n", url);
    }
}

/// Parses the request line of a redirect: `GET /callback?code=...&state=... HTTP/1.1`.
///
/// Returns `None` if the request is not for the callback path.
fn parse_callback(request_line: &str) -> Option<GoogleResult<(String, String)>> {
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 || parts[0] != "GET" {
        return None;
    }

    let target = parts[1];
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    if path != CALLBACK_PATH {
        return None;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;

    for param in query.split('&') {
        if let Some((key, value)) = param.split_once('=') {
            let value = urlencoding::decode(&value.replace('+', " "))
                .map(|v| v.into_owned())
                .unwrap_or_default();
            match key {
                "code" => code = Some(value),
                "state" => state = Some(value),
                "error" => error = Some(value),
                _ => {}
            }
        }
    }

    if let Some(error) = error {
        return Some(Err(GoogleError::authentication(format!(
            "authorization denied: {}",
            error
        ))));
    }

    match code {
        Some(c) if !c.is_empty() => Some(Ok((c, state.unwrap_or_default()))),
        _ => Some(Err(GoogleError::authentication(
            "missing authorization code in callback",
        ))),
    }
}

/// Maps a token endpoint failure. `invalid_grant` gets its own code.
fn token_error(what: &str, status: reqwest::StatusCode, body: &str) -> GoogleError {
    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(err) if err.error == "invalid_grant" => GoogleError::invalid_grant(format!(
            "{} rejected: {}",
            what,
            err.error_description.unwrap_or(err.error)
        )),
        Ok(err) => GoogleError::authentication(format!(
            "{} failed ({}): {}{}",
            what,
            status,
            err.error,
            err.error_description
                .map(|d| format!(" ({})", d))
                .unwrap_or_default()
        )),
        Err(_) if status.is_server_error() => {
            GoogleError::server(format!("{} failed ({}): {}", what, status, body))
        }
        Err(_) => GoogleError::authentication(format!("{} failed ({}): {}", what, status, body)),
    }
}

/// PKCE flow state and utilities.
///
/// Implements RFC 7636 (Proof Key for Code Exchange).
#[derive(Debug)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 hash of verifier, base64url encoded).
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        let verifier = Self::generate_verifier();
        let challenge = Self::compute_challenge(&verifier);
        let state = Self::generate_state();

        Self {
            verifier,
            challenge,
            state,
        }
    }

    fn generate_verifier() -> String {
        let mut rng = rand::rng();
        let bytes: Vec<u8> = (0..CODE_VERIFIER_LENGTH).map(|_| rng.random()).collect();
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    fn generate_state() -> String {
        let mut rng = rand::rng();
        let bytes: Vec<u8> = (0..16).map(|_| rng.random()).collect();
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    /// Builds the authorization URL for `auth_endpoint`.
    ///
    /// Requests offline access so that a refresh token is issued.
    pub fn build_auth_url(
        &self,
        auth_endpoint: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> String {
        let scope = scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            auth_endpoint,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Error body from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}
