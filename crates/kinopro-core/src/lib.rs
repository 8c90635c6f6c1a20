//! kinopro.uz Extractor Core Library
//!
//! This crate logs into kinopro.uz with form credentials, keeps the session
//! cookies on disk between runs and turns player pages into an ordered
//! collection of episodes.
//!
//! # Features
//! - Form login with a per-credential cookie cache (Netscape cookie files)
//! - Rate-limited HTTP client bound to a persistent cookie jar
//! - Season/episode listing parser driven by CSS classes

pub mod auth;
pub mod client;
pub mod config;
pub mod cookies;
pub mod error;
pub mod extractor;
pub mod html;
pub mod parser;
pub mod types;

// Re-export main types for convenience
pub use auth::{AuthSession, Credentials, SessionAuthenticator};
pub use client::{KinoproClient, RateLimiter};
pub use config::ExtractorConfig;
pub use cookies::{SessionJar, StoredCookie};
pub use error::{AuthError, KinoproError, Result};
pub use extractor::{parse_player_url, KinoproExtractor};
pub use html::{HtmlQuery, ScraperQuery};
pub use parser::{parse_listing, ListingParser};
pub use types::{Entity, EntityCollection, PlayerUrl};
