//! HTML parsers for kinopro.uz pages
//!
//! - `listing`: season/episode blocks of a player page

pub mod listing;

pub use listing::{parse_listing, ListingParser, ITEM_CLASS, LABEL_CLASS, LINK_ATTRIBUTE, SEASON_CLASS};
