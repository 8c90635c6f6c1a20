//! Episode listing parser for kinopro.uz player pages.
//!
//! A player page groups episodes into season blocks (`.slist`); each season
//! holds item blocks (`.item`) carrying a `link` attribute and an episode
//! label element (`.play_episod`).

use tracing::debug;

use crate::error::Result;
use crate::html::{HtmlQuery, ScraperQuery};
use crate::types::{Entity, EntityCollection};

/// Class of a season block
pub const SEASON_CLASS: &str = "slist";
/// Class of an episode block inside a season
pub const ITEM_CLASS: &str = "item";
/// Class of the episode label inside an item
pub const LABEL_CLASS: &str = "play_episod";
/// Attribute holding the player link, on the item or on an element inside it
pub const LINK_ATTRIBUTE: &str = "link";

/// Turns a listing page into an [`EntityCollection`].
///
/// Stateless; parsing the same input twice gives the same output.
#[derive(Debug, Clone, Default)]
pub struct ListingParser<Q = ScraperQuery> {
    query: Q,
}

impl ListingParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<Q: HtmlQuery> ListingParser<Q> {
    /// Use a different HTML query backend.
    pub fn with_query(query: Q) -> Self {
        Self { query }
    }

    /// Parse a listing page.
    ///
    /// Missing seasons, items or labels are skipped rather than reported.
    ///
    /// # Errors
    /// `KinoproError::ParseError` only when the HTML backend cannot run a query at all.
    pub fn parse(&self, html: &str, title: &str) -> Result<EntityCollection> {
        let mut entities = Vec::new();

        let seasons = self.query.elements_by_class(html, SEASON_CLASS)?;
        for (season_index, season) in seasons.iter().enumerate() {
            for item in self.query.elements_by_class(season, ITEM_CLASS)? {
                if let Some(entity) = self.parse_item(&item, title, season_index)? {
                    entities.push(entity);
                }
            }
        }

        debug!(
            title,
            seasons = seasons.len(),
            entities = entities.len(),
            "parsed listing"
        );
        Ok(EntityCollection::new(title, entities))
    }

    fn parse_item(&self, item: &str, title: &str, season_index: usize) -> Result<Option<Entity>> {
        let link = self.query.find_attribute(item, LINK_ATTRIBUTE);

        let Some(label_html) = self.query.element_by_class(item, LABEL_CLASS)? else {
            debug!(title, season_index, "item without episode label skipped");
            return Ok(None);
        };
        let label = self.query.text(&label_html);
        if label.is_empty() {
            debug!(title, season_index, "item with empty episode label skipped");
            return Ok(None);
        }

        Ok(Some(Entity::new(title, label, season_index, link)))
    }
}

/// Parse a listing page with the default scraper backend.
///
/// # Examples
/// ```
/// use kinopro_core::parser::parse_listing;
///
/// let html = r#"<div class="slist"><div class="item" link="/v/1"><span class="play_episod">1 серия</span></div></div>"#;
/// let collection = parse_listing(html, "lost").unwrap();
/// assert_eq!(collection.entities[0].composite_key(), "lost_1 серия");
/// ```
pub fn parse_listing(html: &str, title: &str) -> Result<EntityCollection> {
    ListingParser::new().parse(html, title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(label: &str, link: &str) -> String {
        format!(
            r#"<div class="item" link="{}"><span class="play_episod"><b>{}</b></span></div>"#,
            link, label
        )
    }

    fn page(seasons: &[Vec<String>]) -> String {
        let blocks: String = seasons
            .iter()
            .map(|items| format!(r#"<div class="slist">{}</div>"#, items.concat()))
            .collect();
        format!("<html><body><div id=\"player\">{}</div></body></html>", blocks)
    }

    #[test]
    fn test_parse_three_items_then_empty_season() {
        let html = page(&[
            vec![item("1 серия", "/v/1"), item("2 серия", "/v/2"), item("3 серия", "/v/3")],
            vec![],
        ]);
        let collection = parse_listing(&html, "lost").unwrap();

        assert_eq!(collection.entities.len(), 3);
        assert!(collection.entities.iter().all(|e| e.season_index() == 0));
        assert_eq!(collection.entities[1].id(), "2 серия");
        assert_eq!(collection.entities[1].link(), Some("/v/2"));
    }

    #[test]
    fn test_season_index_follows_block_order() {
        let html = page(&[
            vec![item("1", "/s1/1")],
            vec![],
            vec![item("1", "/s3/1"), item("2", "/s3/2")],
        ]);
        let collection = parse_listing(&html, "lost").unwrap();

        let indexes: Vec<usize> = collection.entities.iter().map(|e| e.season_index()).collect();
        assert_eq!(indexes, vec![0, 2, 2]);
    }

    #[test]
    fn test_no_seasons_gives_empty_collection() {
        let collection = parse_listing("<html><body><p>nothing</p></body></html>", "lost").unwrap();
        assert!(collection.is_empty());
        assert_eq!(collection.collection_id, "lost");
        assert_eq!(collection.title, "lost");
    }

    #[test]
    fn test_empty_document() {
        assert!(parse_listing("", "lost").unwrap().is_empty());
    }

    #[test]
    fn test_item_without_label_is_omitted() {
        let html = page(&[vec![
            r#"<div class="item" link="/v/0"><span>trailer</span></div>"#.to_string(),
            item("1", "/v/1"),
        ]]);
        let collection = parse_listing(&html, "lost").unwrap();
        assert_eq!(collection.entities.len(), 1);
        assert_eq!(collection.entities[0].id(), "1");
    }

    #[test]
    fn test_item_without_link_keeps_entity() {
        let html = page(&[vec![
            r#"<div class="item"><span class="play_episod">1</span></div>"#.to_string(),
        ]]);
        let collection = parse_listing(&html, "lost").unwrap();
        assert_eq!(collection.entities.len(), 1);
        assert_eq!(collection.entities[0].link(), None);
    }

    #[test]
    fn test_link_on_nested_element_is_used() {
        let html = page(&[vec![
            r#"<div class="item"><a link="/v/1"><span class="play_episod">1</span></a></div>"#
                .to_string(),
        ]]);
        let collection = parse_listing(&html, "lost").unwrap();
        assert_eq!(collection.entities.len(), 1);
        assert_eq!(collection.entities[0].link(), Some("/v/1"));
    }

    #[test]
    fn test_duplicate_labels_are_kept() {
        let html = page(&[vec![item("1", "/a")], vec![item("1", "/b")]]);
        let collection = parse_listing(&html, "lost").unwrap();
        assert_eq!(collection.entities.len(), 2);
        assert_eq!(
            collection.entities[0].composite_key(),
            collection.entities[1].composite_key()
        );
    }

    #[test]
    fn test_items_outside_seasons_are_ignored() {
        let html = format!("<div>{}</div>{}", item("0", "/x"), page(&[vec![item("1", "/v/1")]]));
        let collection = parse_listing(&html, "lost").unwrap();
        assert_eq!(collection.entities.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_composite_key_is_title_and_id(
            title in "[a-z_]{1,12}",
            counts in proptest::collection::vec(0usize..4, 0..4),
        ) {
            let seasons: Vec<Vec<String>> = counts
                .iter()
                .map(|n| (1..=*n).map(|i| item(&i.to_string(), "/v")).collect())
                .collect();
            let html = page(&seasons);
            let collection = parse_listing(&html, &title).unwrap();

            prop_assert_eq!(collection.entities.len(), counts.iter().sum::<usize>());
            for entity in &collection.entities {
                prop_assert_eq!(entity.composite_key(), format!("{}_{}", title, entity.id()));
            }
        }

        #[test]
        fn prop_parse_is_deterministic(counts in proptest::collection::vec(0usize..4, 0..4)) {
            let seasons: Vec<Vec<String>> = counts
                .iter()
                .map(|n| (1..=*n).map(|i| item(&format!("{} серия", i), "/v")).collect())
                .collect();
            let html = page(&seasons);

            let first = serde_json::to_string(&parse_listing(&html, "lost").unwrap()).unwrap();
            let second = serde_json::to_string(&parse_listing(&html, "lost").unwrap()).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
