// src/crawl/testing.rs
// =============================================================================
// Test helpers: an in-memory site and settings rooted in a temp directory.
// =============================================================================

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::checker::{FetchError, FetchedPage, PageFetcher};
use crate::config::{Settings, SettingsFile};

/// Settings for `https://example.com` with log id `test_run`, writing the
/// baseline into `dir`.
pub(crate) fn settings_in(dir: &Path, tweak: impl FnOnce(&mut SettingsFile)) -> Settings {
    let mut file = SettingsFile {
        site_url: Some("https://example.com".into()),
        log_id: Some("test_run".into()),
        base_links_file: Some(dir.join("base-links.txt")),
        ..Default::default()
    };
    tweak(&mut file);
    Settings::try_from(file).unwrap()
}

/// Pages keyed by absolute URL. Anything else answers 404.
#[derive(Default)]
pub(crate) struct FakeSite {
    pages: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    log: Mutex<Vec<String>>,
}

impl FakeSite {
    /// `/` links to /about, /blog, /missing (absent) and an outer site;
    /// /blog links to /blog/post-1.
    pub(crate) fn sample() -> Self {
        let mut site = FakeSite::default();
        site.page(
            "https://example.com/",
            "<html><head><title>Home</title></head><body>\
             <a href='/about'>About</a>\
             <a href='/blog/'>Blog</a>\
             <a href='https://other.com/'>Other</a>\
             <a href='/missing'>Missing</a>\
             </body></html>",
        );
        site.page(
            "https://example.com/about",
            "<title>About</title><a href='/'>Home</a>",
        );
        site.page(
            "https://example.com/blog",
            "<title>Blog</title><a href='/blog/post-1'>One</a>",
        );
        site.page(
            "https://example.com/blog/post-1",
            "<title>Post 1</title><a href='/about#team'>About</a>",
        );
        site
    }

    pub(crate) fn page(&mut self, url: &str, html: &str) {
        self.pages.insert(url.to_string(), html.to_string());
    }

    /// Makes `url` report the given load time.
    pub(crate) fn slow(&mut self, url: &str, elapsed: Duration) {
        self.delays.insert(url.to_string(), elapsed);
    }

    /// Every URL requested so far, in order.
    pub(crate) fn fetched(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn was_fetched(&self, url: &str) -> bool {
        self.log.lock().unwrap().iter().any(|u| u == url)
    }

    /// URLs requested more than once.
    pub(crate) fn fetched_twice(&self) -> Vec<String> {
        let log = self.log.lock().unwrap();
        let mut repeated: Vec<String> = Vec::new();
        for (i, url) in log.iter().enumerate() {
            if log[..i].contains(url) && !repeated.contains(url) {
                repeated.push(url.clone());
            }
        }
        repeated
    }
}

#[async_trait]
impl PageFetcher for FakeSite {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.log.lock().unwrap().push(url.to_string());
        let html = self.pages.get(url).ok_or(FetchError::Status(404))?;
        let elapsed = self
            .delays
            .get(url)
            .copied()
            .unwrap_or(Duration::from_millis(10));
        Ok(FetchedPage::from_html(url, 200, html.clone(), elapsed))
    }
}
