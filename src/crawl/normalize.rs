// src/crawl/normalize.rs
// =============================================================================
// URL normalization.
//
// Every href found on a page goes through `normalize` before it touches the
// frontier. The canonical form is
//
//     scheme://host[:port]/path[?query]
//
// percent-decoded, with the path trimmed of leading/trailing separators and a
// single leading slash put back. Two links are the same page iff their
// canonical forms are byte-equal.
//
// Relative links take the scheme and host of the configured site. Note that
// they are resolved against the site root, not the page they were found on:
// "about" on /blog/post becomes /about.
// =============================================================================

use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use url::Url;

/// Decoding can surface new separators, so the normalization step is repeated
/// until it settles. Inputs that do not settle within this many rounds are
/// rejected.
const MAX_ROUNDS: usize = 8;

/// Scheme and authority of the monitored site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteUrl {
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl SiteUrl {
    /// Builds the site description from a parsed URL. Only http(s) URLs with
    /// a host qualify.
    pub fn from_url(url: &Url) -> Option<Self> {
        let scheme = url.scheme().to_ascii_lowercase();
        if scheme != "http" && scheme != "https" {
            return None;
        }
        let host = url.host_str()?.to_ascii_lowercase();
        Some(SiteUrl {
            scheme,
            host,
            port: url.port(),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Host without a leading `www.`, used for the outer-URL test.
    pub fn bare_host(&self) -> &str {
        strip_www(&self.host)
    }

    /// The site root every link is resolved against.
    fn root(&self) -> Option<Url> {
        let root = match self.port {
            Some(port) => format!("{}://{}:{}/", self.scheme, self.host, port),
            None => format!("{}://{}/", self.scheme, self.host),
        };
        Url::parse(&root).ok()
    }
}

/// Canonicalizes `raw` against `site`. `None` means the link can never be
/// crawled (non-http scheme, unparsable, or a form that does not settle).
///
/// The result is always a fixed point: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(raw: &str, site: &SiteUrl) -> Option<String> {
    let root = site.root()?;
    let mut current = normalize_once(raw, &root)?;
    for _ in 0..MAX_ROUNDS {
        let next = normalize_once(&current, &root)?;
        if next == current {
            return Some(current);
        }
        current = next;
    }
    None
}

fn normalize_once(raw: &str, root: &Url) -> Option<String> {
    // Mail-style and credentialed URIs are left alone.
    if raw.contains('@') {
        return Some(raw.to_string());
    }

    let url = root.join(raw).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    let host = url.host_str()?;

    let mut canonical = match url.port() {
        Some(port) => format!("{}://{}:{}/", url.scheme(), host, port),
        None => format!("{}://{}/", url.scheme(), host),
    };
    canonical.push_str(url.path().trim_matches('/'));
    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        canonical.push('?');
        canonical.push_str(query);
    }

    Some(decode(canonical))
}

/// Decodes `%XX` escapes (`+` is left as is). When the decoded bytes are not
/// UTF-8 the escapes are kept, so distinct byte sequences stay distinct.
fn decode(encoded: String) -> String {
    let decoded = percent_decode_str(&encoded)
        .decode_utf8()
        .map(Cow::into_owned);
    decoded.unwrap_or(encoded)
}

/// True when `url` lies outside the site: its host is neither the site host
/// (ignoring a leading `www.`) nor a subdomain of it. URLs without a host are
/// outer.
pub fn is_outer_url(url: &str, site: &SiteUrl) -> bool {
    let host = match Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_ascii_lowercase)) {
        Some(host) => host,
        None => return true,
    };
    let site_host = site.bare_host();
    let inner = host == site_host
        || host
            .strip_suffix(site_host)
            .map_or(false, |prefix| prefix.ends_with('.'));
    !inner
}

fn strip_www(host: &str) -> &str {
    match host.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("www.") => &host[4..],
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteUrl {
        SiteUrl::from_url(&Url::parse("https://example.com").unwrap()).unwrap()
    }

    fn norm(raw: &str) -> Option<String> {
        normalize(raw, &site())
    }

    #[test]
    fn test_relative_links_resolve_against_site_root() {
        assert_eq!(norm("/docs/").as_deref(), Some("https://example.com/docs"));
        assert_eq!(norm("docs/intro").as_deref(), Some("https://example.com/docs/intro"));
        assert_eq!(norm("").as_deref(), Some("https://example.com/"));
        assert_eq!(norm("#top").as_deref(), Some("https://example.com/"));
    }

    #[test]
    fn test_absolute_links_keep_their_host_and_port() {
        assert_eq!(
            norm("http://Other.COM:8080/a/b/").as_deref(),
            Some("http://other.com:8080/a/b")
        );
        assert_eq!(norm("//cdn.example.com/x").as_deref(), Some("https://cdn.example.com/x"));
    }

    #[test]
    fn test_query_kept_fragment_dropped() {
        assert_eq!(
            norm("/search/?q=rust&page=2#results").as_deref(),
            Some("https://example.com/search?q=rust&page=2")
        );
        assert_eq!(norm("/search?").as_deref(), Some("https://example.com/search"));
    }

    #[test]
    fn test_non_http_schemes_rejected() {
        assert_eq!(norm("javascript:void(0)"), None);
        assert_eq!(norm("tel:+123456"), None);
        assert_eq!(norm("ftp://example.com/file"), None);
    }

    #[test]
    fn test_at_sign_left_untouched() {
        assert_eq!(norm("mailto:team@example.com").as_deref(), Some("mailto:team@example.com"));
    }

    #[test]
    fn test_percent_decoding_and_backslashes() {
        assert_eq!(
            norm("/caf%C3%A9/menu%20du%20jour").as_deref(),
            Some("https://example.com/café/menu du jour")
        );
        assert_eq!(norm("\\path\\").as_deref(), Some("https://example.com/path"));
        assert_eq!(norm("/a+b").as_deref(), Some("https://example.com/a+b"));
    }

    #[test]
    fn test_undecodable_escapes_stay_distinct() {
        let ff = norm("/page%FF").unwrap();
        let fe = norm("/page%FE").unwrap();
        let replacement = norm("/page%EF%BF%BD").unwrap();
        assert_eq!(ff, "https://example.com/page%FF");
        assert_eq!(fe, "https://example.com/page%FE");
        assert_ne!(ff, fe);
        assert_ne!(ff, replacement);
        assert_eq!(norm(&ff).as_deref(), Some(ff.as_str()));
    }

    #[test]
    fn test_site_port_used_for_relative_links() {
        let site = SiteUrl::from_url(&Url::parse("http://localhost:8080/app").unwrap()).unwrap();
        assert_eq!(
            normalize("docs", &site).as_deref(),
            Some("http://localhost:8080/docs")
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "/",
            "/a/b/",
            "https://www.example.com/x?y=1",
            "/double%252Fencoded",
            "/trailing%2F",
            "/hash%23inside",
            "/q%3Fmark",
            "HTTP://EXAMPLE.COM/Case",
            "relative/path?x=%2F",
            "//example.com:8443//deep//",
            "mailto:a@b.c",
            "/page%FF/caf%C3%A9",
            "/menu du jour",
        ];
        for raw in samples {
            if let Some(once) = norm(raw) {
                assert_eq!(norm(&once).as_deref(), Some(once.as_str()), "input {raw}");
            }
        }
    }

    #[test]
    fn test_outer_urls() {
        let site = site();
        assert!(!is_outer_url("https://example.com/x", &site));
        assert!(!is_outer_url("https://www.example.com/x", &site));
        assert!(!is_outer_url("https://blog.example.com/x", &site));
        assert!(is_outer_url("https://other.com/x", &site));
        assert!(is_outer_url("https://notexample.com/x", &site));
        assert!(is_outer_url("mailto:a@example.com", &site));
    }

    #[test]
    fn test_www_site_host_is_stripped() {
        let site = SiteUrl::from_url(&Url::parse("http://www.example.com").unwrap()).unwrap();
        assert_eq!(site.bare_host(), "example.com");
        assert!(!is_outer_url("http://example.com/", &site));
    }
}
