//! Data types for the kinopro extractor
//!
//! Everything the extractor hands back to callers implements `Serialize`
//! so it can be printed as JSON by the CLI.

use serde::Serialize;

/// One playable unit (an episode) found on a listing page.
///
/// Fields are private; [`Entity::new`] is the only constructor and derives
/// the composite key, so it always equals `"{title}_{id}"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    id: String,
    composite_key: String,
    season_index: usize,
    link: Option<String>,
}

impl Entity {
    /// Build an entity from the listing title and the episode label.
    pub fn new(
        title: &str,
        label: impl Into<String>,
        season_index: usize,
        link: Option<String>,
    ) -> Self {
        let id = label.into();
        Self {
            composite_key: format!("{}_{}", title, id),
            id,
            season_index,
            link,
        }
    }

    /// Episode label as shown on the page
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `title + "_" + id`; not guaranteed unique across a collection
    pub fn composite_key(&self) -> &str {
        &self.composite_key
    }

    /// Zero-based position of the season block the entity was found in
    pub fn season_index(&self) -> usize {
        self.season_index
    }

    /// Raw `link` attribute of the item block, needed to resolve playback later
    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }
}

/// Ordered entities extracted from one listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityCollection {
    /// Identifier of the collection (the listing title)
    pub collection_id: String,
    /// Listing title
    pub title: String,
    /// Entities in document order
    pub entities: Vec<Entity>,
}

impl EntityCollection {
    /// Create a collection whose identifier is its title.
    pub fn new(title: impl Into<String>, entities: Vec<Entity>) -> Self {
        let title = title.into();
        Self {
            collection_id: title.clone(),
            title,
            entities,
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities belonging to the season at `season_index`.
    pub fn season(&self, season_index: usize) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .filter(move |entity| entity.season_index == season_index)
    }
}

/// Parsed `player/<kind>/<title>` page address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerUrl {
    /// Content kind segment (e.g. `serial`)
    pub kind: String,
    /// Title slug, used as collection id
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_composite_key() {
        let entity = Entity::new("lost", "1 серия", 0, Some("/v/1".to_string()));
        assert_eq!(entity.id(), "1 серия");
        assert_eq!(entity.composite_key(), "lost_1 серия");
        assert_eq!(entity.season_index(), 0);
        assert_eq!(entity.link(), Some("/v/1"));
    }

    #[test]
    fn test_collection_id_is_title() {
        let collection = EntityCollection::new("lost", Vec::new());
        assert_eq!(collection.collection_id, "lost");
        assert_eq!(collection.title, "lost");
        assert!(collection.is_empty());
    }

    #[test]
    fn test_collection_season_filter() {
        let collection = EntityCollection::new(
            "lost",
            vec![
                Entity::new("lost", "1", 0, None),
                Entity::new("lost", "1", 1, None),
                Entity::new("lost", "2", 1, None),
            ],
        );
        assert_eq!(collection.len(), 3);
        assert_eq!(collection.season(1).count(), 2);
        assert_eq!(collection.season(5).count(), 0);
    }

    #[test]
    fn test_entity_serialization() {
        let entity = Entity::new("lost", "2", 1, None);
        let json = serde_json::to_string(&entity).unwrap();
        assert_eq!(
            json,
            r#"{"id":"2","composite_key":"lost_2","season_index":1,"link":null}"#
        );
    }
}
