//! Class-based HTML queries
//!
//! The parsers only need a handful of structural lookups, so they talk to
//! the [`HtmlQuery`] trait and never to the HTML library directly. Elements
//! travel between calls as their outer HTML.

use std::collections::{BTreeMap, HashMap};

use scraper::{ElementRef, Html, Selector};

use crate::error::{KinoproError, Result};

/// Narrow set of HTML lookups used by the login flow and the listing parser.
pub trait HtmlQuery: Send + Sync {
    /// Outer HTML of every outermost element carrying `class`, in document order.
    ///
    /// Elements nested inside another match are not returned separately.
    fn elements_by_class(&self, html: &str, class: &str) -> Result<Vec<String>>;

    /// Outer HTML of the first element carrying `class`.
    fn element_by_class(&self, html: &str, class: &str) -> Result<Option<String>> {
        Ok(self.elements_by_class(html, class)?.into_iter().next())
    }

    /// Attributes of the root element of `element_html`.
    fn attributes(&self, element_html: &str) -> HashMap<String, String>;

    /// Value of attribute `name` on the root element of `element_html`, or
    /// else on the first descendant carrying it, in document order.
    fn find_attribute(&self, element_html: &str, name: &str) -> Option<String>;

    /// Text content with all markup stripped and whitespace collapsed.
    fn text(&self, html: &str) -> String;

    /// Name/value pairs of the hidden and submit inputs of a form page.
    fn hidden_inputs(&self, html: &str) -> BTreeMap<String, String>;
}

/// [`HtmlQuery`] backed by the `scraper` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScraperQuery;

impl ScraperQuery {
    pub fn new() -> Self {
        Self
    }
}

fn class_selector(class: &str) -> Result<Selector> {
    Selector::parse(&format!(".{}", class))
        .map_err(|e| KinoproError::ParseError(format!("Invalid class selector {:?}: {:?}", class, e)))
}

fn has_class(element: &ElementRef, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

fn root_element(fragment: &Html) -> Option<ElementRef<'_>> {
    fragment
        .root_element()
        .children()
        .filter_map(ElementRef::wrap)
        .next()
}

impl HtmlQuery for ScraperQuery {
    fn elements_by_class(&self, html: &str, class: &str) -> Result<Vec<String>> {
        let selector = class_selector(class)?;
        let document = Html::parse_fragment(html);

        let elements = document
            .select(&selector)
            .filter(|element| {
                !element
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .any(|ancestor| has_class(&ancestor, class))
            })
            .map(|element| element.html())
            .collect();

        Ok(elements)
    }

    fn attributes(&self, element_html: &str) -> HashMap<String, String> {
        let fragment = Html::parse_fragment(element_html);
        root_element(&fragment)
            .map(|element| {
                element
                    .value()
                    .attrs()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn find_attribute(&self, element_html: &str, name: &str) -> Option<String> {
        if let Some(value) = self.attributes(element_html).remove(name) {
            return Some(value);
        }
        let fragment = Html::parse_fragment(element_html);
        let value = root_element(&fragment)?
            .descendent_elements()
            .find_map(|element| element.attr(name))
            .map(str::to_string);
        value
    }

    fn text(&self, html: &str) -> String {
        let fragment = Html::parse_fragment(html);
        let text = fragment.root_element().text().collect::<String>();
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn hidden_inputs(&self, html: &str) -> BTreeMap<String, String> {
        let mut inputs = BTreeMap::new();
        let Ok(selector) = Selector::parse("input") else {
            return inputs;
        };
        let document = Html::parse_document(html);

        for input in document.select(&selector) {
            let element = input.value();
            let kind = element.attr("type").unwrap_or_default().to_ascii_lowercase();
            if kind != "hidden" && kind != "submit" {
                continue;
            }
            let name = element
                .attr("name")
                .filter(|name| !name.is_empty())
                .or_else(|| element.attr("id").filter(|id| !id.is_empty()));
            if let (Some(name), Some(value)) = (name, element.attr("value")) {
                inputs.insert(name.to_string(), value.to_string());
            }
        }

        inputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elements_by_class_document_order() {
        let html = r#"<div class="a">1</div><p class="b a">2</p><span class="a">3</span>"#;
        let found = ScraperQuery.elements_by_class(html, "a").unwrap();
        assert_eq!(found.len(), 3);
        assert!(found[0].contains(">1<"));
        assert!(found[1].contains(">2<"));
        assert!(found[2].contains(">3<"));
    }

    #[test]
    fn test_elements_by_class_skips_nested_matches() {
        let html = r#"<div class="slist"><div class="slist">inner</div></div><div class="slist">2</div>"#;
        let found = ScraperQuery.elements_by_class(html, "slist").unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].contains("inner"));
    }

    #[test]
    fn test_elements_by_class_does_not_match_substrings() {
        let html = r#"<div class="items">x</div><div class="item-wrapper">y</div>"#;
        let found = ScraperQuery.elements_by_class(html, "item").unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_elements_by_class_invalid_class_is_parse_error() {
        let result = ScraperQuery.elements_by_class("<div></div>", "bad class!");
        assert!(matches!(result, Err(KinoproError::ParseError(_))));
    }

    #[test]
    fn test_element_by_class_first_match() {
        let html = r#"<b class="play_episod">1</b><b class="play_episod">2</b>"#;
        let found = ScraperQuery.element_by_class(html, "play_episod").unwrap();
        assert!(found.unwrap().contains(">1<"));
        assert!(ScraperQuery.element_by_class(html, "missing").unwrap().is_none());
    }

    #[test]
    fn test_attributes_of_root_element() {
        let html = r#"<div class="item" link="/watch/1" data-id="7"><a href="/inner">x</a></div>"#;
        let attrs = ScraperQuery.attributes(html);
        assert_eq!(attrs.get("link").map(String::as_str), Some("/watch/1"));
        assert_eq!(attrs.get("data-id").map(String::as_str), Some("7"));
        assert!(!attrs.contains_key("href"));
    }

    #[test]
    fn test_attributes_of_text_is_empty() {
        assert!(ScraperQuery.attributes("just text").is_empty());
    }

    #[test]
    fn test_find_attribute_prefers_root() {
        let html = r#"<div class="item" link="/outer"><a link="/inner">x</a></div>"#;
        assert_eq!(ScraperQuery.find_attribute(html, "link").as_deref(), Some("/outer"));
    }

    #[test]
    fn test_find_attribute_falls_back_to_first_descendant() {
        let html =
            r#"<div class="item"><span><a link="/first">1</a></span><a link="/second">2</a></div>"#;
        assert_eq!(ScraperQuery.find_attribute(html, "link").as_deref(), Some("/first"));
        assert_eq!(ScraperQuery.find_attribute(html, "href"), None);
        assert_eq!(ScraperQuery.find_attribute("just text", "link"), None);
    }

    #[test]
    fn test_text_strips_tags_and_collapses_whitespace() {
        let html = "<span class=\"play_episod\">\n  <b>1</b>\n  серия &amp; more </span>";
        assert_eq!(ScraperQuery.text(html), "1 серия & more");
    }

    #[test]
    fn test_hidden_inputs() {
        let html = r#"
            <form method="post">
                <input type="hidden" name="AUTH_FORM" value="Y">
                <input type="HIDDEN" name="sessid" value="abc123">
                <input type="hidden" id="backurl" value="/">
                <input type="hidden" name="novalue">
                <input type="text" name="USER_LOGIN" value="">
                <input type="submit" name="Login" value="Войти">
            </form>"#;
        let inputs = ScraperQuery.hidden_inputs(html);

        assert_eq!(inputs.len(), 4);
        assert_eq!(inputs["AUTH_FORM"], "Y");
        assert_eq!(inputs["sessid"], "abc123");
        assert_eq!(inputs["backurl"], "/");
        assert_eq!(inputs["Login"], "Войти");
        assert!(!inputs.contains_key("USER_LOGIN"));
    }
}
