//! OAuth credential storage.
//!
//! The token file uses Google's "authorized user" JSON shape, so it embeds
//! everything needed to refresh the access token on a later run: the refresh
//! token, the token endpoint and the OAuth client id/secret.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::GOOGLE_TOKEN_URL;
use crate::error::{GoogleError, GoogleResult};

/// Credentials are treated as expired this long before their real expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

/// An OAuth credential for the Calendar API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// The access token for API requests.
    #[serde(rename = "token", default)]
    pub access_token: String,

    /// The refresh token for obtaining new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token endpoint used for refreshes.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    /// OAuth client the credential was issued to.
    #[serde(default)]
    pub client_id: String,

    /// Secret of the OAuth client.
    #[serde(default)]
    pub client_secret: String,

    /// The OAuth scopes the credential is bound to.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// When the access token expires. `None` means it does not expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

/// A token endpoint response to a refresh request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_in: Option<i64>,
    /// Google normally omits this; when present it replaces the stored one.
    pub refresh_token: Option<String>,
}

impl Credential {
    /// Returns true if the access token is expired or about to expire at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now >= expiry - Duration::seconds(EXPIRY_SKEW_SECS),
            None => false,
        }
    }

    /// Returns true if the credential can be used as-is at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && !self.is_expired_at(now)
    }

    /// Returns true if a refresh token is available.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Binds the credential to `scopes`, replacing whatever the file recorded.
    pub fn constrain_scopes(mut self, scopes: &[String]) -> Self {
        self.scopes = scopes.to_vec();
        self
    }

    /// Applies a successful refresh received at `now`.
    pub fn apply_refresh(&mut self, refreshed: RefreshedToken, now: DateTime<Utc>) {
        self.access_token = refreshed.access_token;
        self.expiry = refreshed
            .expires_in
            .map(|secs| now + Duration::seconds(secs));
        if let Some(refresh_token) = refreshed.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
    }

    /// Returns the time until the token expires, if known.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expiry.map(|expiry| expiry - Utc::now())
    }
}

/// File-backed credential storage.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Creates a store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the token file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the token file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the credential, bound to `scopes`.
    ///
    /// Returns `Ok(None)` when no token file exists.
    pub fn load(&self, scopes: &[String]) -> GoogleResult<Option<Credential>> {
        if !self.path.exists() {
            debug!("no token file at {:?}", self.path);
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            GoogleError::configuration(format!(
                "failed to read token file {}: {}",
                self.path.display(),
                e
            ))
            .with_source(e)
        })?;

        let credential: Credential = serde_json::from_str(&content).map_err(|e| {
            GoogleError::configuration(format!(
                "failed to parse token file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        info!("loaded credential from {:?}", self.path);
        Ok(Some(credential.constrain_scopes(scopes)))
    }

    /// Writes `credential` to disk, replacing any previous file.
    pub fn save(&self, credential: &Credential) -> GoogleResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                GoogleError::configuration(format!("failed to create token directory: {}", e))
                    .with_source(e)
            })?;
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(credential)
            .map_err(|e| GoogleError::internal(format!("failed to serialize credential: {}", e)))?;

        if let Err(e) = write_private(&temp_path, content.as_bytes())
            .and_then(|()| fs::rename(&temp_path, &self.path))
        {
            let _ = fs::remove_file(&temp_path);
            return Err(
                GoogleError::configuration(format!("failed to write token file: {}", e))
                    .with_source(e),
            );
        }

        debug!("saved credential to {:?}", self.path);
        Ok(())
    }

    /// Removes the token file if present.
    pub fn clear(&self) -> GoogleResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                GoogleError::configuration(format!("failed to remove token file: {}", e))
                    .with_source(e)
            })?;
            info!("cleared credential at {:?}", self.path);
        }
        Ok(())
    }
}

/// Writes `content` to a new file readable only by the owner.
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // The mode only applies on creation; tighten a leftover temp file too.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(content)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scope() -> Vec<String> {
        vec!["https://www.googleapis.com/auth/calendar".to_string()]
    }

    fn sample(expiry: Option<DateTime<Utc>>) -> Credential {
        Credential {
            access_token: "access-token".to_string(),
            refresh_token: Some("refresh-token".to_string()),
            token_uri: GOOGLE_TOKEN_URL.to_string(),
            client_id: "id.apps.googleusercontent.com".to_string(),
            client_secret: "secret".to_string(),
            scopes: scope(),
            expiry,
        }
    }

    #[test]
    fn expiry_uses_skew() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let cred = sample(Some(now + Duration::seconds(30)));
        assert!(cred.is_expired_at(now));
        assert!(!cred.is_valid_at(now));

        let cred = sample(Some(now + Duration::minutes(10)));
        assert!(!cred.is_expired_at(now));
        assert!(cred.is_valid_at(now));
    }

    #[test]
    fn no_expiry_never_expires() {
        let cred = sample(None);
        assert!(!cred.is_expired_at(Utc::now() + Duration::days(3650)));
    }

    #[test]
    fn empty_access_token_is_invalid() {
        let mut cred = sample(None);
        cred.access_token.clear();
        assert!(!cred.is_valid_at(Utc::now()));
    }

    #[test]
    fn can_refresh_requires_non_empty_token() {
        let mut cred = sample(None);
        assert!(cred.can_refresh());
        cred.refresh_token = Some(String::new());
        assert!(!cred.can_refresh());
        cred.refresh_token = None;
        assert!(!cred.can_refresh());
    }

    #[test]
    fn apply_refresh_updates_token_and_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let mut cred = sample(Some(now - Duration::hours(1)));
        cred.apply_refresh(
            RefreshedToken {
                access_token: "new-access".to_string(),
                expires_in: Some(3599),
                refresh_token: None,
            },
            now,
        );

        assert_eq!(cred.access_token, "new-access");
        assert_eq!(cred.refresh_token.as_deref(), Some("refresh-token"));
        assert_eq!(cred.expiry, Some(now + Duration::seconds(3599)));
        assert!(cred.is_valid_at(now));
    }

    #[test]
    fn reads_google_authorized_user_file() {
        let json = r#"{
            "token": "ya29.a0",
            "refresh_token": "1//0g",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "id.apps.googleusercontent.com",
            "client_secret": "secret",
            "scopes": ["https://www.googleapis.com/auth/calendar.readonly"],
            "universe_domain": "googleapis.com",
            "account": "",
            "expiry": "2024-06-01T10:00:00.123456Z"
        }"#;

        let cred: Credential = serde_json::from_str(json).unwrap();
        assert_eq!(cred.access_token, "ya29.a0");
        assert_eq!(cred.refresh_token.as_deref(), Some("1//0g"));
        assert_eq!(
            cred.expiry.map(|e| e.timestamp()),
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap().timestamp())
        );
    }

    #[test]
    fn storage_round_trip_constrains_scopes() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        let mut cred = sample(None);
        cred.scopes = vec!["something-else".to_string()];
        store.save(&cred).unwrap();
        assert!(store.exists());

        let loaded = store.load(&scope()).unwrap().unwrap();
        assert_eq!(loaded.access_token, "access-token");
        assert_eq!(loaded.scopes, scope());
    }

    #[test]
    fn storage_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("nested").join("token.json"));
        store.save(&sample(None)).unwrap();
        assert!(store.exists());
    }

    #[test]
    fn storage_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        assert!(store.load(&scope()).unwrap().is_none());
    }

    #[test]
    fn storage_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "{not json").unwrap();

        let err = TokenStore::new(&path).load(&scope()).unwrap_err();
        assert!(err.message().contains("failed to parse token file"));
    }

    #[test]
    fn storage_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        store.save(&sample(None)).unwrap();
        store.clear().unwrap();
        assert!(!store.exists());
        store.clear().unwrap();
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        // A directory in the way makes the rename fail.
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        let err = TokenStore::new(&path).save(&sample(None)).unwrap_err();

        assert!(err.message().contains("failed to write token file"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn leftover_temp_file_is_made_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        let temp = store.path().with_extension("json.tmp");
        fs::write(&temp, "stale").unwrap();
        fs::set_permissions(&temp, fs::Permissions::from_mode(0o644)).unwrap();

        store.save(&sample(None)).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!temp.exists());
    }

    #[cfg(unix)]
    #[test]
    fn storage_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        store.save(&sample(None)).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
