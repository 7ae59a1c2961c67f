// src/crawl/frontier.rs
// =============================================================================
// The frontier: which links we know about, which we fetched, which failed.
//
//   links   - every accepted URL, in discovery order, no duplicates
//   visited - fetched successfully
//   broken  - failed to fetch; never retried, never accepted again
//
// A URL can sit in `links` without being in either of the other two sets: it
// is queued but not processed yet. `visited` and `broken` never overlap.
// Nothing is removed during a run.
// =============================================================================

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::normalize::{is_outer_url, normalize, SiteUrl};

/// What `add_link` accepts: the site, whether to stay on it, and the ignore
/// patterns. Built from the settings.
#[derive(Debug, Clone)]
pub struct Scope {
    site: SiteUrl,
    ignore_outer: bool,
    ignored: Vec<Regex>,
}

impl Scope {
    pub fn new(site: SiteUrl, ignore_outer: bool, ignored: Vec<Regex>) -> Self {
        Scope {
            site,
            ignore_outer,
            ignored,
        }
    }

    pub fn site(&self) -> &SiteUrl {
        &self.site
    }

    pub fn normalize(&self, raw: &str) -> Option<String> {
        normalize(raw, &self.site)
    }

    pub fn is_outer(&self, url: &str) -> bool {
        is_outer_url(url, &self.site)
    }

    fn is_ignored(&self, url: &str) -> bool {
        self.ignored.iter().any(|pattern| pattern.is_match(url))
    }
}

/// Insertion-ordered set of URLs. Serialized as a plain list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct LinkSet {
    items: Vec<String>,
    index: HashSet<String>,
}

impl LinkSet {
    pub fn contains(&self, url: &str) -> bool {
        self.index.contains(url)
    }

    /// Returns false when the URL was already present.
    pub fn insert(&mut self, url: &str) -> bool {
        if self.index.contains(url) {
            return false;
        }
        self.index.insert(url.to_string());
        self.items.push(url.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&str> {
        self.items.get(i).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for LinkSet {
    fn from(items: Vec<String>) -> Self {
        let mut set = LinkSet::default();
        for item in &items {
            set.insert(item);
        }
        set
    }
}

impl From<LinkSet> for Vec<String> {
    fn from(set: LinkSet) -> Self {
        set.items
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Frontier {
    links: LinkSet,
    visited: LinkSet,
    broken: LinkSet,
}

impl Frontier {
    pub fn new() -> Self {
        Frontier::default()
    }

    /// Normalizes `raw` and records it as discovered.
    ///
    /// Returns false, leaving the frontier untouched, when the link is empty,
    /// not crawlable, already visited, already broken, outside the site while
    /// outer links are ignored, or matched by an ignore pattern. Returns true
    /// otherwise, including when the link was already known.
    pub fn add_link(&mut self, raw: &str, scope: &Scope) -> bool {
        if raw.is_empty() {
            return false;
        }
        let url = match scope.normalize(raw) {
            Some(url) => url,
            None => return false,
        };
        if self.is_visited(&url) || self.is_broken(&url) {
            return false;
        }
        if scope.ignore_outer && scope.is_outer(&url) {
            return false;
        }
        if scope.is_ignored(&url) {
            return false;
        }
        self.links.insert(&url);
        true
    }

    /// Idempotent. Refuses URLs already marked broken.
    pub fn mark_visited(&mut self, url: &str) -> bool {
        if url.is_empty() || self.broken.contains(url) {
            return false;
        }
        self.visited.insert(url);
        true
    }

    /// Idempotent. Refuses URLs already marked visited.
    pub fn mark_broken(&mut self, url: &str) -> bool {
        if url.is_empty() || self.visited.contains(url) {
            return false;
        }
        self.broken.insert(url);
        true
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn is_broken(&self, url: &str) -> bool {
        self.broken.contains(url)
    }

    pub fn links(&self) -> &LinkSet {
        &self.links
    }

    pub fn visited(&self) -> &LinkSet {
        &self.visited
    }

    pub fn broken(&self) -> &LinkSet {
        &self.broken
    }

    /// Links still waiting to be processed, in discovery order.
    pub fn pending(&self) -> Vec<String> {
        self.links
            .iter()
            .filter(|url| !self.is_visited(url) && !self.is_broken(url))
            .map(str::to_string)
            .collect()
    }

    /// Links that were never fetched successfully (pending or broken).
    pub fn unvisited(&self) -> Vec<String> {
        self.links
            .iter()
            .filter(|url| !self.is_visited(url))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn scope(ignore_outer: bool, ignored: &[&str]) -> Scope {
        let site = SiteUrl::from_url(&Url::parse("https://example.com").unwrap()).unwrap();
        let ignored = ignored
            .iter()
            .map(|p| regex::RegexBuilder::new(p).case_insensitive(true).build().unwrap())
            .collect();
        Scope::new(site, ignore_outer, ignored)
    }

    #[test]
    fn test_add_link_deduplicates() {
        let scope = scope(true, &[]);
        let mut frontier = Frontier::new();
        assert!(frontier.add_link("/about", &scope));
        assert!(frontier.add_link("https://example.com/about/", &scope));
        assert_eq!(frontier.links().len(), 1);
        assert_eq!(frontier.links().get(0), Some("https://example.com/about"));
    }

    #[test]
    fn test_rejections_do_not_mutate() {
        let scope = scope(true, &["/WP-ADMIN"]);
        let mut frontier = Frontier::new();
        assert!(!frontier.add_link("", &scope));
        assert!(!frontier.add_link("javascript:void(0)", &scope));
        assert!(!frontier.add_link("https://other.com/page", &scope));
        assert!(!frontier.add_link("/wp-admin/options.php", &scope));
        assert!(frontier.links().is_empty());
    }

    #[test]
    fn test_outer_links_allowed_when_configured() {
        let scope = scope(false, &[]);
        let mut frontier = Frontier::new();
        assert!(frontier.add_link("https://other.com/page", &scope));
        assert_eq!(frontier.links().len(), 1);
    }

    #[test]
    fn test_broken_links_never_come_back() {
        let scope = scope(true, &[]);
        let mut frontier = Frontier::new();
        assert!(frontier.add_link("/gone", &scope));
        assert!(frontier.mark_broken("https://example.com/gone"));
        assert!(!frontier.add_link("/gone", &scope));
        assert!(!frontier.mark_visited("https://example.com/gone"));
        assert!(!frontier.is_visited("https://example.com/gone"));
        assert!(frontier.pending().is_empty());
        assert_eq!(frontier.unvisited(), vec!["https://example.com/gone"]);
    }

    #[test]
    fn test_visited_and_broken_stay_disjoint() {
        let mut frontier = Frontier::new();
        assert!(frontier.mark_visited("https://example.com/"));
        assert!(frontier.mark_visited("https://example.com/"));
        assert!(!frontier.mark_broken("https://example.com/"));
        assert_eq!(frontier.visited().len(), 1);
        assert!(frontier.broken().is_empty());
    }

    #[test]
    fn test_serialized_frontier_rebuilds_index() {
        let scope = scope(true, &[]);
        let mut frontier = Frontier::new();
        frontier.add_link("/a", &scope);
        frontier.add_link("/b", &scope);
        frontier.mark_visited("https://example.com/a");

        let json = serde_json::to_string(&frontier).unwrap();
        let back: Frontier = serde_json::from_str(&json).unwrap();
        assert!(back.is_visited("https://example.com/a"));
        assert_eq!(back.pending(), vec!["https://example.com/b"]);
    }
}
