//! Credential acquisition.
//!
//! [`CredentialManager`] turns whatever is on disk into a usable
//! [`SessionHandle`]:
//!
//! 1. Load the token file, bound to the calendar scope
//! 2. Classify it as valid, refreshable or unusable
//! 3. Refresh if possible; a failed refresh is logged and dropped
//! 4. Otherwise run the interactive flow using the client secret file
//! 5. Persist any new or refreshed credential before building the session
//!
//! Concurrent runs against the same token file are not coordinated; the last
//! writer wins.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::client::GoogleCalendarClient;
use crate::config::{GoogleConfig, OAuthCredentials};
use crate::error::{GoogleError, GoogleErrorCode, SessionError};
use crate::oauth::{Authorizer, OAuthClient, TokenRefresher};
use crate::session::SessionHandle;
use crate::tokens::{Credential, TokenStore};

/// What a loaded credential is good for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialState {
    /// Usable as-is.
    Valid(Credential),
    /// Expired (or missing its access token) but carries a refresh token.
    NeedsRefresh(Credential),
    /// Nothing usable; interactive authorization is required.
    NeedsReauth,
}

impl CredentialState {
    /// Classifies a loaded credential at `now`.
    pub fn classify(credential: Option<Credential>, now: DateTime<Utc>) -> Self {
        match credential {
            Some(c) if c.is_valid_at(now) => Self::Valid(c),
            Some(c) if c.can_refresh() => Self::NeedsRefresh(c),
            _ => Self::NeedsReauth,
        }
    }
}

/// Loads, refreshes, authorizes and persists the calendar credential.
pub struct CredentialManager {
    config: GoogleConfig,
    store: TokenStore,
    scopes: Vec<String>,
    refresher: Arc<dyn TokenRefresher>,
    authorizer: Arc<dyn Authorizer>,
}

impl CredentialManager {
    /// Creates a manager that talks to Google's OAuth endpoints.
    pub fn new(config: GoogleConfig) -> Result<Self, SessionError> {
        let oauth = Arc::new(
            OAuthClient::from_config(&config).map_err(SessionError::ServiceConstructionFailed)?,
        );
        Ok(Self::with_components(config, oauth.clone(), oauth))
    }

    /// Creates a manager with custom refresh and authorization back ends.
    pub fn with_components(
        config: GoogleConfig,
        refresher: Arc<dyn TokenRefresher>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        let store = TokenStore::new(&config.token_path);
        Self {
            config,
            store,
            scopes: GoogleConfig::required_scopes(),
            refresher,
            authorizer,
        }
    }

    /// Produces a session bound to a valid credential.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Storage`] if the token file is unreadable or cannot be written
    /// - [`SessionError::MissingConfiguration`] if authorization is needed and
    ///   the client secret file does not exist
    /// - [`SessionError::AuthorizationFlowFailed`] if the interactive flow fails
    /// - [`SessionError::ServiceConstructionFailed`] if the API client cannot be built
    pub async fn acquire_session(&self) -> Result<SessionHandle, SessionError> {
        let loaded = self
            .store
            .load(&self.scopes)
            .map_err(SessionError::Storage)?;

        let credential = match CredentialState::classify(loaded, Utc::now()) {
            CredentialState::Valid(credential) => {
                debug!("stored credential is valid");
                credential
            }
            CredentialState::NeedsRefresh(credential) => {
                let credential = match self.try_refresh(credential).await {
                    Some(refreshed) => refreshed,
                    None => self.reauthorize().await?,
                };
                self.persist(&credential)?;
                credential
            }
            CredentialState::NeedsReauth => {
                debug!("no usable credential, authorization required");
                let credential = self.reauthorize().await?;
                self.persist(&credential)?;
                credential
            }
        };

        self.build_session(credential)
    }

    /// Refreshes `credential`, returning `None` if the refresh failed.
    async fn try_refresh(&self, mut credential: Credential) -> Option<Credential> {
        info!("access token expired, refreshing");
        match self.refresher.refresh(&credential).await {
            Ok(refreshed) if !refreshed.access_token.is_empty() => {
                credential.apply_refresh(refreshed, Utc::now());
                Some(credential)
            }
            Ok(_) => {
                warn!("token refresh returned an empty access token, re-authorizing");
                None
            }
            Err(e) if e.code() == GoogleErrorCode::InvalidGrant => {
                info!("refresh token was rejected, re-authorizing: {}", e.message());
                None
            }
            Err(e) => {
                warn!("token refresh failed, re-authorizing: {}", e);
                None
            }
        }
    }

    /// Runs the interactive flow with the operator's client secret file.
    async fn reauthorize(&self) -> Result<Credential, SessionError> {
        let path = &self.config.client_secret_path;
        if !path.exists() {
            return Err(SessionError::MissingConfiguration { path: path.clone() });
        }

        let client =
            OAuthCredentials::from_file(path).map_err(SessionError::AuthorizationFlowFailed)?;

        let credential = self
            .authorizer
            .authorize(&client, &self.scopes)
            .await
            .map_err(SessionError::AuthorizationFlowFailed)?;

        if credential.access_token.is_empty() {
            return Err(SessionError::AuthorizationFlowFailed(
                GoogleError::invalid_response("authorization returned no access token"),
            ));
        }

        info!("authorization complete");
        Ok(credential.constrain_scopes(&self.scopes))
    }

    fn persist(&self, credential: &Credential) -> Result<(), SessionError> {
        self.store.save(credential).map_err(SessionError::Storage)
    }

    fn build_session(&self, credential: Credential) -> Result<SessionHandle, SessionError> {
        let client = GoogleCalendarClient::with_api_root(
            credential.access_token.clone(),
            self.config.timeout,
            &self.config.endpoints.api_root,
        )
        .map_err(SessionError::ServiceConstructionFailed)?;

        Ok(SessionHandle::new(client, credential))
    }
}

/// Acquires a calendar session using `config`.
///
/// See [`CredentialManager::acquire_session`].
pub async fn acquire_session(config: &GoogleConfig) -> Result<SessionHandle, SessionError> {
    CredentialManager::new(config.clone())?
        .acquire_session()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GOOGLE_TOKEN_URL;
    use crate::error::GoogleResult;
    use crate::service::BoxFuture;
    use crate::tokens::RefreshedToken;
    use chrono::Duration;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CLIENT_SECRET_JSON: &str = r#"{
        "installed": {
            "client_id": "test-client.apps.googleusercontent.com",
            "client_secret": "test-secret",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token",
            "redirect_uris": ["http://localhost"]
        }
    }"#;

    #[derive(Default)]
    struct MockRefresher {
        calls: AtomicUsize,
        fail_with: Option<GoogleErrorCode>,
    }

    impl MockRefresher {
        fn failing(code: GoogleErrorCode) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_with: Some(code),
            }
        }
    }

    impl TokenRefresher for MockRefresher {
        fn refresh<'a>(
            &'a self,
            _credential: &'a Credential,
        ) -> BoxFuture<'a, GoogleResult<RefreshedToken>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = match self.fail_with {
                Some(code) => Err(GoogleError::new(code, "simulated refresh failure")),
                None => Ok(RefreshedToken {
                    access_token: "refreshed-access".to_string(),
                    expires_in: Some(3600),
                    refresh_token: None,
                }),
            };
            Box::pin(async move { result })
        }
    }

    #[derive(Default)]
    struct MockAuthorizer {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Authorizer for MockAuthorizer {
        fn authorize<'a>(
            &'a self,
            credentials: &'a OAuthCredentials,
            scopes: &'a [String],
        ) -> BoxFuture<'a, GoogleResult<Credential>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if self.fail {
                Err(GoogleError::authentication("authorization denied: access_denied"))
            } else {
                Ok(Credential {
                    access_token: "authorized-access".to_string(),
                    refresh_token: Some("authorized-refresh".to_string()),
                    token_uri: GOOGLE_TOKEN_URL.to_string(),
                    client_id: credentials.client_id.clone(),
                    client_secret: credentials.client_secret.clone(),
                    scopes: scopes.to_vec(),
                    expiry: Some(Utc::now() + Duration::hours(1)),
                })
            };
            Box::pin(async move { result })
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        refresher: Arc<MockRefresher>,
        authorizer: Arc<MockAuthorizer>,
    }

    impl Fixture {
        fn new(refresher: MockRefresher, authorizer: MockAuthorizer) -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                refresher: Arc::new(refresher),
                authorizer: Arc::new(authorizer),
            }
        }

        fn config(&self) -> GoogleConfig {
            GoogleConfig::in_dir(self.dir.path())
        }

        fn manager(&self) -> CredentialManager {
            CredentialManager::with_components(
                self.config(),
                self.refresher.clone(),
                self.authorizer.clone(),
            )
        }

        fn write_token(&self, credential: &Credential) {
            TokenStore::new(self.config().token_path)
                .save(credential)
                .unwrap();
        }

        fn write_client_secret(&self) {
            fs::write(self.config().client_secret_path, CLIENT_SECRET_JSON).unwrap();
        }

        fn token_file(&self) -> String {
            fs::read_to_string(self.config().token_path).unwrap()
        }

        fn stored(&self) -> Credential {
            serde_json::from_str(&self.token_file()).unwrap()
        }

        fn refresh_calls(&self) -> usize {
            self.refresher.calls.load(Ordering::SeqCst)
        }

        fn authorize_calls(&self) -> usize {
            self.authorizer.calls.load(Ordering::SeqCst)
        }
    }

    fn credential(expiry: DateTime<Utc>) -> Credential {
        Credential {
            access_token: "stored-access".to_string(),
            refresh_token: Some("stored-refresh".to_string()),
            token_uri: GOOGLE_TOKEN_URL.to_string(),
            client_id: "test-client.apps.googleusercontent.com".to_string(),
            client_secret: "test-secret".to_string(),
            scopes: GoogleConfig::required_scopes(),
            expiry: Some(expiry),
        }
    }

    #[test]
    fn classify_states() {
        let now = Utc::now();

        let valid = credential(now + Duration::hours(1));
        assert_eq!(
            CredentialState::classify(Some(valid.clone()), now),
            CredentialState::Valid(valid)
        );

        let expired = credential(now - Duration::hours(1));
        assert_eq!(
            CredentialState::classify(Some(expired.clone()), now),
            CredentialState::NeedsRefresh(expired.clone())
        );

        let mut no_refresh = expired;
        no_refresh.refresh_token = None;
        assert_eq!(
            CredentialState::classify(Some(no_refresh), now),
            CredentialState::NeedsReauth
        );

        let mut empty_token = credential(now + Duration::hours(1));
        empty_token.access_token.clear();
        assert!(matches!(
            CredentialState::classify(Some(empty_token), now),
            CredentialState::NeedsRefresh(_)
        ));

        assert_eq!(
            CredentialState::classify(None, now),
            CredentialState::NeedsReauth
        );
    }

    #[tokio::test]
    async fn missing_files_reports_client_secret_path() {
        let fx = Fixture::new(MockRefresher::default(), MockAuthorizer::default());

        let err = fx.manager().acquire_session().await.unwrap_err();

        assert!(matches!(err, SessionError::MissingConfiguration { .. }));
        let expected = fx.config().client_secret_path;
        assert!(err.to_string().contains(&expected.display().to_string()));
        assert_eq!(fx.authorize_calls(), 0);
        assert!(!fx.config().token_path.exists());
    }

    #[tokio::test]
    async fn valid_credential_is_used_without_flow_or_write() {
        let fx = Fixture::new(MockRefresher::default(), MockAuthorizer::default());
        let stored = credential(Utc::now() + Duration::hours(1));
        fx.write_token(&stored);
        let before = fx.token_file();

        let session = fx.manager().acquire_session().await.unwrap();

        assert_eq!(session.credential(), &stored);
        assert_eq!(fx.refresh_calls(), 0);
        assert_eq!(fx.authorize_calls(), 0);
        assert_eq!(fx.token_file(), before);
    }

    #[tokio::test]
    async fn expired_credential_is_refreshed_and_persisted() {
        let fx = Fixture::new(MockRefresher::default(), MockAuthorizer::default());
        fx.write_token(&credential(Utc::now() - Duration::hours(1)));

        let session = fx.manager().acquire_session().await.unwrap();

        assert_eq!(fx.refresh_calls(), 1);
        assert_eq!(fx.authorize_calls(), 0);
        assert_eq!(session.credential().access_token, "refreshed-access");

        let stored = fx.stored();
        assert_eq!(stored.access_token, "refreshed-access");
        assert_eq!(stored.refresh_token.as_deref(), Some("stored-refresh"));
        assert!(stored.is_valid_at(Utc::now()));
    }

    #[tokio::test]
    async fn failed_refresh_falls_back_to_authorization() {
        let fx = Fixture::new(
            MockRefresher::failing(GoogleErrorCode::NetworkError),
            MockAuthorizer::default(),
        );
        fx.write_token(&credential(Utc::now() - Duration::hours(1)));
        fx.write_client_secret();

        let session = fx.manager().acquire_session().await.unwrap();

        assert_eq!(fx.refresh_calls(), 1);
        assert_eq!(fx.authorize_calls(), 1);
        assert_eq!(session.credential().access_token, "authorized-access");
        assert_eq!(fx.stored().access_token, "authorized-access");
    }

    #[tokio::test]
    async fn revoked_refresh_token_falls_back_to_authorization() {
        let fx = Fixture::new(
            MockRefresher::failing(GoogleErrorCode::InvalidGrant),
            MockAuthorizer::default(),
        );
        fx.write_token(&credential(Utc::now() - Duration::hours(1)));
        fx.write_client_secret();

        fx.manager().acquire_session().await.unwrap();

        assert_eq!(fx.authorize_calls(), 1);
        assert_eq!(
            fx.stored().refresh_token.as_deref(),
            Some("authorized-refresh")
        );
    }

    #[tokio::test]
    async fn failed_refresh_without_client_secret_is_missing_configuration() {
        let fx = Fixture::new(
            MockRefresher::failing(GoogleErrorCode::NetworkError),
            MockAuthorizer::default(),
        );
        let stored = credential(Utc::now() - Duration::hours(1));
        fx.write_token(&stored);

        let err = fx.manager().acquire_session().await.unwrap_err();

        assert!(matches!(err, SessionError::MissingConfiguration { .. }));
        assert!(!err.to_string().contains("simulated refresh failure"));
        assert_eq!(fx.stored(), stored);
    }

    #[tokio::test]
    async fn expired_without_refresh_token_goes_straight_to_authorization() {
        let fx = Fixture::new(MockRefresher::default(), MockAuthorizer::default());
        let mut stored = credential(Utc::now() - Duration::hours(1));
        stored.refresh_token = None;
        fx.write_token(&stored);
        fx.write_client_secret();

        fx.manager().acquire_session().await.unwrap();

        assert_eq!(fx.refresh_calls(), 0);
        assert_eq!(fx.authorize_calls(), 1);
    }

    #[tokio::test]
    async fn first_run_authorizes_and_persists() {
        let fx = Fixture::new(MockRefresher::default(), MockAuthorizer::default());
        fx.write_client_secret();

        let session = fx.manager().acquire_session().await.unwrap();

        assert_eq!(fx.authorize_calls(), 1);
        let stored = fx.stored();
        assert_eq!(&stored, session.credential());
        assert_eq!(stored.client_id, "test-client.apps.googleusercontent.com");
        assert_eq!(stored.scopes, GoogleConfig::required_scopes());

        // The persisted file alone is enough for the next run.
        let session = fx.manager().acquire_session().await.unwrap();
        assert_eq!(fx.authorize_calls(), 1);
        assert_eq!(session.credential().access_token, "authorized-access");
    }

    #[tokio::test]
    async fn authorization_failure_is_reported() {
        let fx = Fixture::new(
            MockRefresher::default(),
            MockAuthorizer {
                calls: AtomicUsize::new(0),
                fail: true,
            },
        );
        fx.write_client_secret();

        let err = fx.manager().acquire_session().await.unwrap_err();

        assert!(matches!(err, SessionError::AuthorizationFlowFailed(_)));
        assert!(err.to_string().contains("access_denied"));
        assert!(!fx.config().token_path.exists());
    }

    #[tokio::test]
    async fn malformed_client_secret_is_authorization_failure() {
        let fx = Fixture::new(MockRefresher::default(), MockAuthorizer::default());
        fs::write(fx.config().client_secret_path, "{}").unwrap();

        let err = fx.manager().acquire_session().await.unwrap_err();

        assert!(matches!(err, SessionError::AuthorizationFlowFailed(_)));
        assert_eq!(fx.authorize_calls(), 0);
    }

    #[tokio::test]
    async fn corrupt_token_file_is_storage_error() {
        let fx = Fixture::new(MockRefresher::default(), MockAuthorizer::default());
        fs::write(fx.config().token_path, "{not json").unwrap();
        fx.write_client_secret();

        let err = fx.manager().acquire_session().await.unwrap_err();

        assert!(matches!(err, SessionError::Storage(_)));
        assert_eq!(fx.authorize_calls(), 0);
    }

    #[tokio::test]
    async fn expired_credential_is_refreshed_over_http() {
        use crate::config::GoogleEndpoints;
        use wiremock::matchers::{body_string_contains, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=stored-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "http-refreshed-access",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = GoogleConfig::in_dir(dir.path()).with_endpoints(GoogleEndpoints {
            auth_url: format!("{}/auth", server.uri()),
            token_url: format!("{}/token", server.uri()),
            api_root: server.uri(),
        });
        let mut stored = credential(Utc::now() - Duration::hours(1));
        stored.token_uri = format!("{}/token", server.uri());
        TokenStore::new(&config.token_path).save(&stored).unwrap();

        let session = CredentialManager::new(config.clone())
            .unwrap()
            .acquire_session()
            .await
            .unwrap();

        assert_eq!(session.credential().access_token, "http-refreshed-access");
        let written = TokenStore::new(&config.token_path)
            .load(&GoogleConfig::required_scopes())
            .unwrap()
            .unwrap();
        assert_eq!(written.access_token, "http-refreshed-access");
        assert_eq!(written.refresh_token.as_deref(), Some("stored-refresh"));
        assert_eq!(written.token_uri, stored.token_uri);
        assert!(written.is_valid_at(Utc::now()));
    }

    #[tokio::test]
    async fn stored_scopes_are_replaced_on_load() {
        let fx = Fixture::new(MockRefresher::default(), MockAuthorizer::default());
        let mut stored = credential(Utc::now() + Duration::hours(1));
        stored.scopes = vec!["https://www.googleapis.com/auth/calendar.readonly".to_string()];
        fx.write_token(&stored);

        let session = fx.manager().acquire_session().await.unwrap();

        assert_eq!(
            session.credential().scopes,
            GoogleConfig::required_scopes()
        );
    }
}
