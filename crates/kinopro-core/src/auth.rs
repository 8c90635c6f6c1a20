//! Credential login and session cookie persistence
//!
//! A logged-in session is a cookie jar holding the marker cookie
//! (`BITRIX_SM_LOGIN` by default). Jars are cached on disk, one Netscape
//! cookie file per credential fingerprint, so a valid session is reused
//! instead of logging in on every run.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use reqwest::Url;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::client::KinoproClient;
use crate::config::ExtractorConfig;
use crate::cookies::SessionJar;
use crate::error::{AuthError, KinoproError, Result};
use crate::html::{HtmlQuery, ScraperQuery};

/// Environment variable holding the username
pub const USERNAME_ENV: &str = "KINOPRO_USERNAME";
/// Environment variable holding the password
pub const PASSWORD_ENV: &str = "KINOPRO_PASSWORD";

/// Username and password for the site. The password is redacted from `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Build credentials from optional parts.
    ///
    /// # Errors
    /// `AuthError::MissingCredentials` when either part is absent or empty.
    pub fn from_options(
        username: Option<String>,
        password: Option<String>,
    ) -> std::result::Result<Self, AuthError> {
        match (username, password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Ok(Self::new(username, password))
            }
            _ => Err(AuthError::MissingCredentials),
        }
    }

    /// Read `KINOPRO_USERNAME` and `KINOPRO_PASSWORD`.
    ///
    /// # Errors
    /// `AuthError::MissingCredentials` when either variable is unset or empty.
    pub fn from_env() -> std::result::Result<Self, AuthError> {
        Self::from_options(
            std::env::var(USERNAME_ENV).ok(),
            std::env::var(PASSWORD_ENV).ok(),
        )
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Hex SHA-256 of `username`, a NUL byte and `password`.
    ///
    /// Names the session cache file without revealing the credentials.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.username.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.password.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Cookie jar of a checked session, ready for authenticated fetches.
#[derive(Debug, Clone)]
pub struct AuthSession {
    jar: Arc<SessionJar>,
    authenticated: bool,
    fingerprint: String,
}

impl AuthSession {
    pub fn jar(&self) -> &Arc<SessionJar> {
        &self.jar
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Fingerprint of the credentials this session belongs to
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// HTTP client sending this session's cookies.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created
    pub fn client(&self, config: &ExtractorConfig) -> Result<KinoproClient> {
        KinoproClient::with_jar(config, Arc::clone(&self.jar))
    }
}

/// Logs in with form credentials and keeps the resulting cookies on disk.
///
/// Clones share the per-fingerprint locks, so concurrent calls for the same
/// credentials through clones of one authenticator run one after another.
/// Cache files are replaced atomically; separate processes are not serialized.
#[derive(Clone)]
pub struct SessionAuthenticator {
    config: ExtractorConfig,
    query: Arc<dyn HtmlQuery>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl SessionAuthenticator {
    pub fn new(config: ExtractorConfig) -> Self {
        Self::with_query(config, Arc::new(ScraperQuery))
    }

    /// Use a different HTML backend for hidden form field extraction.
    pub fn with_query(config: ExtractorConfig, query: Arc<dyn HtmlQuery>) -> Self {
        Self {
            config,
            query,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Location of the cached cookie file for `credentials`.
    pub fn cache_path(&self, credentials: &Credentials) -> PathBuf {
        self.config.cache_dir.join(credentials.fingerprint())
    }

    /// Delete the cached session of `credentials`, if any.
    ///
    /// # Errors
    /// `AuthError::StorageUnavailable` when an existing file cannot be removed.
    pub fn invalidate(&self, credentials: &Credentials) -> std::result::Result<(), AuthError> {
        remove_cache_file(&self.cache_path(credentials))
    }

    /// Return a logged-in session, reusing the cached one when still valid.
    ///
    /// The landing page is always fetched once; if the marker cookie is then
    /// present no login is attempted. Otherwise the login form is posted and
    /// the resulting jar is written to the cache.
    ///
    /// # Errors
    /// - `AuthError::StorageUnavailable` - cache directory or file not usable
    /// - `AuthError::InvalidCredentials` - login did not yield the marker cookie;
    ///   the cached file for these credentials is removed
    /// - `KinoproError::HttpError` and friends - network failures
    #[instrument(skip(self, credentials), fields(username = %credentials.username()))]
    pub async fn ensure_authenticated(&self, credentials: &Credentials) -> Result<AuthSession> {
        let fingerprint = credentials.fingerprint();
        let _lease = self.acquire(&fingerprint).await;

        let cache_path = self.prepare_cache(&fingerprint)?;
        let landing_url = Url::parse(&self.config.base_url)
            .map_err(|e| KinoproError::InvalidUrl(format!("{}: {}", self.config.base_url, e)))?;

        let jar = Arc::new(SessionJar::new());
        if cache_path.exists() {
            let cached = SessionJar::load(&cache_path).map_err(|e| storage_error(&cache_path, e))?;
            debug!(fingerprint = %fingerprint, cookies = cached.len(), "loaded cached session");
            jar.merge_from(&cached);
        }

        let client = KinoproClient::with_jar(&self.config, Arc::clone(&jar))?;
        let session = AuthSession {
            jar: Arc::clone(&jar),
            authenticated: true,
            fingerprint: fingerprint.clone(),
        };

        let login_page = client.fetch(landing_url.as_str()).await?;
        if jar.contains(&self.config.marker_cookie, &landing_url) {
            info!(fingerprint = %fingerprint, "valid session cookie found, skipping login");
            return Ok(session);
        }

        let mut form = self.query.hidden_inputs(&login_page);
        form.insert(self.config.login_field.clone(), credentials.username.clone());
        form.insert(self.config.password_field.clone(), credentials.password.clone());

        info!(fingerprint = %fingerprint, "logging in");
        client
            .post_form(landing_url.as_str(), &form, &[("login", "yes")])
            .await?;

        if !jar.contains(&self.config.marker_cookie, &landing_url) {
            if let Err(e) = remove_cache_file(&cache_path) {
                warn!(fingerprint = %fingerprint, error = %e, "could not remove stale session cache");
            }
            warn!(fingerprint = %fingerprint, "login rejected");
            return Err(AuthError::InvalidCredentials.into());
        }

        jar.save(&cache_path).map_err(|e| storage_error(&cache_path, e))?;
        info!(fingerprint = %fingerprint, cookies = jar.len(), "login succeeded, session cached");
        Ok(session)
    }

    /// Wait for exclusive use of `fingerprint`'s session.
    async fn acquire<'a>(&'a self, fingerprint: &'a str) -> LockLease<'a> {
        let lock = self.lock_for(fingerprint);
        LockLease {
            locks: &self.locks,
            fingerprint,
            guard: Some(lock.lock_owned().await),
        }
    }

    fn lock_for(&self, fingerprint: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(fingerprint.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Create the cache directory and return the file path for `fingerprint`.
    fn prepare_cache(&self, fingerprint: &str) -> std::result::Result<PathBuf, AuthError> {
        let dir = &self.config.cache_dir;
        std::fs::create_dir_all(dir).map_err(|e| {
            AuthError::StorageUnavailable(format!(
                "cannot create cache directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(dir.join(fingerprint))
    }
}

/// Held for the duration of one login flow. On release the map entry is
/// dropped unless another caller already holds a handle to the same lock.
struct LockLease<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    fingerprint: &'a str,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.remove_if(self.fingerprint, |_, lock| Arc::strong_count(lock) == 1);
    }
}

fn storage_error(path: &Path, error: io::Error) -> AuthError {
    AuthError::StorageUnavailable(format!("{}: {}", path.display(), error))
}

fn remove_cache_file(path: &Path) -> std::result::Result<(), AuthError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed session cache");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(storage_error(path, e)),
    }
}
