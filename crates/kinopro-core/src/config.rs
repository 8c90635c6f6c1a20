//! Runtime configuration for the extractor
//!
//! Everything that used to be a hard-coded location or site constant is a
//! field here so callers (and tests) can point the extractor elsewhere.

use std::path::PathBuf;

/// Default site root; the login form is served and submitted here
pub const DEFAULT_BASE_URL: &str = "http://kinopro.uz/";

/// Cookie whose presence means the site considers us logged in
pub const DEFAULT_MARKER_COOKIE: &str = "BITRIX_SM_LOGIN";

/// Configuration shared by the authenticator, the HTTP client and the extractor
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Site root, also used as login landing page and login endpoint
    pub base_url: String,
    /// Directory holding one cookie file per credential fingerprint
    pub cache_dir: PathBuf,
    /// Name of the session marker cookie
    pub marker_cookie: String,
    /// Form field carrying the username
    pub login_field: String,
    /// Form field carrying the password
    pub password_field: String,
    /// Maximum requests per second (default: 2.0)
    pub requests_per_second: f64,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_dir: default_cache_dir(),
            marker_cookie: DEFAULT_MARKER_COOKIE.to_string(),
            login_field: "USER_LOGIN".to_string(),
            password_field: "USER_PASSWORD".to_string(),
            requests_per_second: 2.0,
            timeout_secs: 30,
        }
    }
}

impl ExtractorConfig {
    /// Replace the session cache directory.
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    /// Replace the site root. A trailing slash is added when missing.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    /// Replace the request timeout.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// `<platform cache dir>/kinopro`, or the temp dir when the platform has none.
fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("kinopro")
}
