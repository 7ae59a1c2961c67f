// src/checker/html.rs
// =============================================================================
// This module reads what the crawler needs out of an HTML page.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Supports CSS selectors for finding elements
//
// Unlike a link checker, the monitor keeps hrefs exactly as written. Turning
// them into absolute URLs is the normalizer's job, so relative links are
// resolved the same way no matter which page they were found on.
// =============================================================================

use std::sync::OnceLock;

use scraper::{ElementRef, Html, Selector};

use super::Anchor;

/// Title and anchors of a parsed page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageOutline {
    pub title: String,
    pub anchors: Vec<Anchor>,
}

fn anchor_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("a").expect("static selector"))
}

fn title_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("title").expect("static selector"))
}

/// Extracts the `<title>` text and every `<a>` element's href and rel.
///
/// Example:
///   html = "<title>Home</title><a href='/docs' rel='nofollow'>Docs</a>"
///   result.title = "Home", result.anchors = [{href: "/docs", rel: "nofollow"}]
pub fn outline(html: &str) -> PageOutline {
    let document = Html::parse_document(html);

    let title = document
        .select(title_selector())
        .next()
        .map(|node| node.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let anchors = document
        .select(anchor_selector())
        .filter_map(to_anchor)
        .collect();

    PageOutline { title, anchors }
}

fn to_anchor(element: ElementRef<'_>) -> Option<Anchor> {
    let href = element.value().attr("href")?.trim();
    Some(Anchor {
        href: href.to_string(),
        rel: element.value().attr("rel").map(str::to_string),
    })
}

/// Hrefs of the elements matching `selector` (the navigation menu).
/// Elements without an href are skipped. An unparsable selector yields nothing;
/// selectors are validated when the settings are built.
pub fn select_hrefs(html: &str, selector: &str) -> Vec<String> {
    let selector = match Selector::parse(selector) {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .map(|href| href.trim().to_string())
        .collect()
}

/// True when at least one element matches `selector`.
pub fn has_element(html: &str, selector: &str) -> bool {
    let selector = match Selector::parse(selector) {
        Ok(selector) => selector,
        Err(_) => return false,
    };
    let document = Html::parse_document(html);
    let found = document.select(&selector).next().is_some();
    found
}
