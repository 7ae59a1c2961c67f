// src/checker/mod.rs
// =============================================================================
// This module is the boundary between the crawl engine and the outside world:
// getting a page over HTTP and reading its HTML.
//
// Submodules:
// - http: reqwest-based fetcher, error categorization
// - html: title, anchors and CSS-selector queries via scraper
//
// The engine only ever sees `PageFetcher` and the `FetchedPage` shape, so
// tests can swap in an in-memory site.
// =============================================================================

mod html;
mod http;

pub use html::{has_element, outline, select_hrefs, PageOutline};
pub use http::HttpFetcher;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An `<a>` element as found on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub href: String,
    pub rel: Option<String>,
}

impl Anchor {
    pub fn is_nofollow(&self) -> bool {
        self.rel
            .as_deref()
            .map(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("nofollow")))
            .unwrap_or(false)
    }
}

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub content: String,
    pub title: String,
    pub anchors: Vec<Anchor>,
    /// Response headers, names lower-cased.
    pub headers: Vec<(String, String)>,
    pub elapsed: Duration,
}

impl FetchedPage {
    /// Builds a page from raw HTML, parsing title and anchors.
    pub fn from_html(url: &str, status: u16, content: String, elapsed: Duration) -> Self {
        let PageOutline { title, anchors } = outline(&content);
        FetchedPage {
            url: url.to_string(),
            status,
            content,
            title,
            anchors,
            headers: Vec::new(),
            elapsed,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Why a page could not be loaded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("too many redirects")]
    TooManyRedirects,
    #[error("could not resolve hostname")]
    Dns,
    #[error("SSL certificate error")]
    Tls,
    #[error("connection failed")]
    Connect,
    #[error("HTTP {0}")]
    Status(u16),
    #[error("empty response body")]
    EmptyBody,
    #[error("{0}")]
    Other(String),
}

/// Loads one page. Transport, redirects and timeouts are the implementor's
/// concern; the crawl engine only consumes the result.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for &T {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        (**self).fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nofollow_detection() {
        let a = Anchor { href: "/x".into(), rel: Some("noopener NoFollow".into()) };
        assert!(a.is_nofollow());
        let b = Anchor { href: "/x".into(), rel: None };
        assert!(!b.is_nofollow());
    }

    #[test]
    fn test_page_from_html_and_headers() {
        let page = FetchedPage::from_html(
            "https://example.com/",
            200,
            "<title>Home</title><a href='/a'>a</a>".to_string(),
            Duration::from_millis(5),
        )
        .with_header("X-Cache", "HIT");
        assert_eq!(page.title, "Home");
        assert_eq!(page.anchors.len(), 1);
        assert_eq!(page.header("x-cache"), Some("HIT"));
    }
}
