// src/checker/http.rs
// =============================================================================
// This module loads pages over HTTP.
//
// Key functionality:
// - One GET per page, following up to 5 redirects, 10 second timeout
// - Measures how long the page took (for the slow-page warning)
// - Maps reqwest failures onto FetchError (timeout, DNS, TLS, ...)
//
// A page counts as loaded when the final response is not an HTTP error and
// the body is non-empty. Everything else is a FetchError and the URL ends up
// in the broken set.
// =============================================================================

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;

use super::{FetchError, FetchedPage, PageFetcher};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0 Safari/537.36 site-monitor/0.1";

/// reqwest-backed `PageFetcher`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeout(Duration::from_secs(10))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(HttpFetcher { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let started = Instant::now();

        let response = self.client.get(url).send().await.map_err(categorize_error)?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response.text().await.map_err(categorize_error)?;
        let elapsed = started.elapsed();

        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody);
        }

        let page = FetchedPage::from_html(url, status.as_u16(), body, elapsed);
        Ok(headers
            .iter()
            .fold(page, |page, (name, value)| page.with_header(name, value)))
    }
}

// Categorizes different error types from reqwest
//
// reqwest errors can happen for many reasons:
// - Network timeout
// - DNS resolution failure
// - SSL certificate issues
// - Too many redirects
fn categorize_error(error: reqwest::Error) -> FetchError {
    let error_string = error.to_string();
    let lowered = error_string.to_lowercase();

    if error.is_timeout() {
        FetchError::Timeout
    } else if error.is_redirect() {
        FetchError::TooManyRedirects
    } else if error.is_connect() {
        // Connection errors often mean DNS issues or host unreachable
        if lowered.contains("dns") {
            FetchError::Dns
        } else {
            FetchError::Connect
        }
    } else if lowered.contains("certificate") || lowered.contains("ssl") {
        FetchError::Tls
    } else if let Some(status) = error.status() {
        FetchError::Status(status.as_u16())
    } else {
        FetchError::Other(error_string)
    }
}
