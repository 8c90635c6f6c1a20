//! Error types for the kinopro extractor
//!
//! Authentication failures live in [`AuthError`] and are wrapped by the
//! crate-wide [`KinoproError`]. Both serialize as their display string so
//! they can be handed to front ends unchanged.

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Failure to obtain an authenticated session.
///
/// Messages never include the password or cookie values.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No credentials were supplied
    #[error("Login required: provide a kinopro username and password")]
    MissingCredentials,

    /// Cache directory could not be created or a cache file could not be read or written
    #[error("Session storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The login form was submitted but no session cookie came back.
    ///
    /// The site answers identically when another session for the same
    /// account is already active, so both causes are reported.
    #[error("Invalid username or password, or someone is already logged in with this account")]
    InvalidCredentials,
}

/// Error type for kinopro extractor operations
#[derive(Error, Debug)]
pub enum KinoproError {
    /// Authentication failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The document could not be processed at all
    #[error("Failed to parse HTML: {0}")]
    ParseError(String),

    /// Invalid URL format
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Rate limited by the server (HTTP 429)
    #[error("Rate limited - too many requests")]
    RateLimited,

    /// Requested page was not found (HTTP 404)
    #[error("Page not found: {0}")]
    NotFound(String),

    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Server answered with a status that is neither success nor a known error
    #[error("Unexpected HTTP status: {0}")]
    UnexpectedStatus(u16),
}

impl Serialize for KinoproError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl Serialize for AuthError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias for kinopro extractor operations
pub type Result<T> = std::result::Result<T, KinoproError>;
