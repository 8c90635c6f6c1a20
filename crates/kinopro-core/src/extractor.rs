//! High-level extraction API
//!
//! Ties the pieces together: make sure a logged-in session exists, fetch the
//! player page through it and parse the episode listing.

use tracing::{info, instrument};

use crate::auth::{Credentials, SessionAuthenticator};
use crate::config::ExtractorConfig;
use crate::error::{AuthError, KinoproError, Result};
use crate::parser::ListingParser;
use crate::types::{EntityCollection, PlayerUrl};

/// Pattern of a kinopro.uz player page
const PLAYER_URL_PATTERN: &str =
    r"^https?://(?:www\.)?kinopro\.uz/player/(?P<kind>\w+)/(?P<title>\w+)";

/// Split a player page URL into its kind and title segments.
///
/// # Examples
/// ```
/// use kinopro_core::extractor::parse_player_url;
///
/// let player = parse_player_url("http://kinopro.uz/player/serial/lost").unwrap();
/// assert_eq!(player.kind, "serial");
/// assert_eq!(player.title, "lost");
/// assert!(parse_player_url("http://example.com/").is_err());
/// ```
pub fn parse_player_url(url: &str) -> Result<PlayerUrl> {
    let re = regex_lite::Regex::new(PLAYER_URL_PATTERN)
        .map_err(|e| KinoproError::ParseError(e.to_string()))?;
    let caps = re
        .captures(url.trim())
        .ok_or_else(|| KinoproError::InvalidUrl(url.to_string()))?;

    Ok(PlayerUrl {
        kind: caps["kind"].to_string(),
        title: caps["title"].to_string(),
    })
}

/// Main extraction API
///
/// # Example
/// ```no_run
/// use kinopro_core::{Credentials, ExtractorConfig, KinoproExtractor};
///
/// # async fn example() -> Result<(), kinopro_core::KinoproError> {
/// let extractor = KinoproExtractor::new(ExtractorConfig::default());
/// let credentials = Credentials::new("alice", "secret");
/// let collection = extractor
///     .extract("http://kinopro.uz/player/serial/lost", Some(&credentials))
///     .await?;
/// println!("{} episodes", collection.len());
/// # Ok(())
/// # }
/// ```
pub struct KinoproExtractor {
    authenticator: SessionAuthenticator,
    parser: ListingParser,
}

impl KinoproExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self::with_authenticator(SessionAuthenticator::new(config))
    }

    /// Build an extractor around an existing authenticator, sharing its locks.
    pub fn with_authenticator(authenticator: SessionAuthenticator) -> Self {
        Self {
            authenticator,
            parser: ListingParser::new(),
        }
    }

    pub fn authenticator(&self) -> &SessionAuthenticator {
        &self.authenticator
    }

    /// Extract the episode collection of a player page.
    ///
    /// # Errors
    /// - `KinoproError::InvalidUrl` - not a player page URL
    /// - `AuthError::MissingCredentials` - `credentials` is `None`
    /// - any error of [`KinoproExtractor::extract_listing`]
    pub async fn extract(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<EntityCollection> {
        let player = parse_player_url(url)?;
        self.extract_listing(url, &player.title, credentials).await
    }

    /// Log in if needed, fetch `page_url` and parse it as a listing titled `title`.
    ///
    /// # Errors
    /// - `AuthError::MissingCredentials` - `credentials` is `None`
    /// - other `AuthError`s from the login flow
    /// - `KinoproError::HttpError`, `NotFound`, `RateLimited` - page fetch failed
    #[instrument(skip(self, credentials))]
    pub async fn extract_listing(
        &self,
        page_url: &str,
        title: &str,
        credentials: Option<&Credentials>,
    ) -> Result<EntityCollection> {
        let credentials = credentials.ok_or(AuthError::MissingCredentials)?;

        let session = self.authenticator.ensure_authenticated(credentials).await?;
        let client = session.client(self.authenticator.config())?;

        let html = client.fetch(page_url).await?;
        let collection = self.parser.parse(&html, title)?;

        info!(title, entities = collection.len(), "extracted listing");
        Ok(collection)
    }
}
