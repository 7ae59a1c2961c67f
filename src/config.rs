// src/config.rs
// =============================================================================
// Run settings.
//
// Settings arrive as a JSON document (the `monitor.json` file) and are turned
// into an immutable, validated `Settings` value exactly once, before any
// network access. A missing required field or an unusable value is an error
// at construction time.
//
// `Settings` serializes back into the same JSON shape, which is how it is
// stored inside the persisted crawl state between ticks.
// =============================================================================

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use regex::{Regex, RegexBuilder};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::crawl::{Scope, SiteUrl};
use crate::error::{MonitorError, Result};
use crate::report::Level;

/// The on-disk shape of the settings. Every field is optional here; defaults
/// and required fields are resolved by `Settings::try_from`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    pub site_url: Option<String>,
    pub ignored_urls: Option<Vec<String>>,
    pub ignore_outer_urls: Option<bool>,
    pub menu_links_selector: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub allowed_ip: Option<String>,
    pub max_load_time: Option<f64>,
    pub log_id: Option<String>,
    pub email_level: Option<Level>,
    pub base_links_file: Option<PathBuf>,
    pub save_content: Option<bool>,
    pub content_dir: Option<PathBuf>,
    pub required_headers: Option<BTreeMap<String, String>>,
    pub required_elements: Option<BTreeMap<String, String>>,
    pub skip_nofollow: Option<bool>,
}

impl SettingsFile {
    /// Reads a settings file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        if json.trim().is_empty() {
            return Err(MonitorError::invalid("settings", "settings file is empty"));
        }
        Ok(serde_json::from_str(&json)?)
    }

    /// Command-line runs get a generated `log_id` when none is configured.
    pub fn with_cli_defaults(mut self) -> Self {
        if self.log_id.is_none() {
            let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
            self.log_id = Some(format!("monitor_cli_{:x}", stamp));
        }
        self
    }
}

/// A required-element rule: pages whose URL matches `pattern` must contain
/// an element matching `selector`.
#[derive(Debug, Clone)]
pub struct ElementRule {
    pub pattern: Regex,
    pub selector: String,
}

/// Validated run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SettingsFile", into = "SettingsFile")]
pub struct Settings {
    pub site_url: String,
    pub ignored_urls: Vec<String>,
    pub ignore_outer_urls: bool,
    pub menu_links_selector: String,
    pub from: String,
    pub to: String,
    pub allowed_ip: String,
    /// Seconds.
    pub max_load_time: f64,
    pub log_id: String,
    pub email_level: Level,
    pub base_links_file: PathBuf,
    pub save_content: bool,
    pub content_dir: PathBuf,
    pub required_headers: BTreeMap<String, String>,
    pub required_elements: BTreeMap<String, String>,
    pub skip_nofollow: bool,
    scope: Scope,
    element_rules: Vec<ElementRule>,
}

impl Settings {
    /// Validates `file` for a run started by `trigger`. Only command-line
    /// runs get a generated `log_id`; web runs must configure one.
    pub fn for_trigger(file: SettingsFile, trigger: &Trigger) -> Result<Self> {
        let file = match trigger {
            Trigger::Cli => file.with_cli_defaults(),
            Trigger::Web { .. } => file,
        };
        Settings::try_from(file)
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn element_rules(&self) -> &[ElementRule] {
        &self.element_rules
    }
}

impl TryFrom<SettingsFile> for Settings {
    type Error = MonitorError;

    fn try_from(file: SettingsFile) -> Result<Self> {
        let mut site_url = file
            .site_url
            .filter(|s| !s.trim().is_empty())
            .ok_or(MonitorError::ConfigMissing("site_url"))?;
        let log_id = file
            .log_id
            .filter(|s| !s.is_empty())
            .ok_or(MonitorError::ConfigMissing("log_id"))?;

        // Queue and state keys are built from the log id, so keep it file-name safe.
        if !log_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(MonitorError::invalid(
                "log_id",
                "only ASCII letters, digits, '_' and '-' are allowed",
            ));
        }

        if !site_url.contains("://") {
            site_url = format!("http://{}", site_url);
        }
        let parsed = Url::parse(&site_url).map_err(|e| MonitorError::invalid("site_url", e))?;
        let site = SiteUrl::from_url(&parsed)
            .ok_or_else(|| MonitorError::invalid("site_url", "an http(s) URL with a host is required"))?;

        let ignored_urls = file.ignored_urls.unwrap_or_default();
        let ignored = ignored_urls
            .iter()
            .map(|pattern| compile_pattern(pattern, "ignored_urls"))
            .collect::<Result<Vec<_>>>()?;

        let menu_links_selector = file.menu_links_selector.unwrap_or_default();
        if !menu_links_selector.is_empty() {
            check_selector(&menu_links_selector, "menu_links_selector")?;
        }

        let required_elements = file.required_elements.unwrap_or_default();
        let mut element_rules = Vec::with_capacity(required_elements.len());
        for (pattern, selector) in &required_elements {
            check_selector(selector, "required_elements")?;
            element_rules.push(ElementRule {
                pattern: compile_pattern(pattern, "required_elements")?,
                selector: selector.clone(),
            });
        }

        let max_load_time = file.max_load_time.unwrap_or(1.0);
        if !(max_load_time.is_finite() && max_load_time >= 0.0) {
            return Err(MonitorError::invalid("max_load_time", "must be a non-negative number"));
        }

        let ignore_outer_urls = file.ignore_outer_urls.unwrap_or(true);

        Ok(Settings {
            site_url,
            ignore_outer_urls,
            menu_links_selector,
            from: file.from.unwrap_or_default(),
            to: file.to.unwrap_or_default(),
            allowed_ip: file.allowed_ip.unwrap_or_default(),
            max_load_time,
            log_id,
            email_level: file.email_level.unwrap_or(Level::Info),
            base_links_file: file
                .base_links_file
                .unwrap_or_else(|| PathBuf::from("output/base-links.txt")),
            save_content: file.save_content.unwrap_or(false),
            content_dir: file
                .content_dir
                .unwrap_or_else(|| PathBuf::from("output/content")),
            required_headers: file.required_headers.unwrap_or_default(),
            required_elements,
            skip_nofollow: file.skip_nofollow.unwrap_or(false),
            scope: Scope::new(site, ignore_outer_urls, ignored),
            ignored_urls,
            element_rules,
        })
    }
}

impl From<Settings> for SettingsFile {
    fn from(s: Settings) -> Self {
        SettingsFile {
            site_url: Some(s.site_url),
            ignored_urls: Some(s.ignored_urls),
            ignore_outer_urls: Some(s.ignore_outer_urls),
            menu_links_selector: Some(s.menu_links_selector),
            from: Some(s.from),
            to: Some(s.to),
            allowed_ip: Some(s.allowed_ip),
            max_load_time: Some(s.max_load_time),
            log_id: Some(s.log_id),
            email_level: Some(s.email_level),
            base_links_file: Some(s.base_links_file),
            save_content: Some(s.save_content),
            content_dir: Some(s.content_dir),
            required_headers: Some(s.required_headers),
            required_elements: Some(s.required_elements),
            skip_nofollow: Some(s.skip_nofollow),
        }
    }
}

fn compile_pattern(pattern: &str, field: &'static str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| MonitorError::invalid(field, e))
}

fn check_selector(selector: &str, field: &'static str) -> Result<()> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| MonitorError::invalid(field, format!("{}: {}", selector, e)))
}

/// Where a run request came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Command line: synchronous mode, no IP check.
    Cli,
    /// Web request: resumable mode. `internal` marks the scheduler's own
    /// dispatch calls, which skip the allow-list.
    Web { caller_ip: String, internal: bool },
}

impl Trigger {
    /// Rejects web callers whose IP differs from `allowed_ip`.
    pub fn authorize(&self, settings: &Settings) -> Result<()> {
        match self {
            Trigger::Cli => Ok(()),
            Trigger::Web { internal: true, .. } => Ok(()),
            Trigger::Web { caller_ip, .. } => {
                if settings.allowed_ip.is_empty() || *caller_ip != settings.allowed_ip {
                    Err(MonitorError::AccessDenied(caller_ip.clone()))
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(site: &str) -> SettingsFile {
        SettingsFile {
            site_url: Some(site.to_string()),
            log_id: Some("run_1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_site_url_fails_fast() {
        let err = Settings::try_from(SettingsFile::default()).unwrap_err();
        assert!(matches!(err, MonitorError::ConfigMissing("site_url")));
    }

    #[test]
    fn test_missing_log_id_fails_fast() {
        let mut f = file("https://example.com");
        f.log_id = None;
        let err = Settings::try_from(f).unwrap_err();
        assert!(matches!(err, MonitorError::ConfigMissing("log_id")));
    }

    #[test]
    fn test_cli_defaults_generate_log_id() {
        let f = SettingsFile {
            site_url: Some("example.com".to_string()),
            ..Default::default()
        }
        .with_cli_defaults();
        let settings = Settings::try_from(f).unwrap();
        assert!(settings.log_id.starts_with("monitor_cli_"));
    }

    #[test]
    fn test_web_runs_need_an_explicit_log_id() {
        let f = SettingsFile {
            site_url: Some("example.com".to_string()),
            allowed_ip: Some("10.0.0.1".to_string()),
            ..Default::default()
        };
        let web = Trigger::Web {
            caller_ip: "10.0.0.1".to_string(),
            internal: false,
        };
        let err = Settings::for_trigger(f.clone(), &web).unwrap_err();
        assert!(matches!(err, MonitorError::ConfigMissing("log_id")));

        let internal = Trigger::Web {
            caller_ip: String::new(),
            internal: true,
        };
        assert!(Settings::for_trigger(f.clone(), &internal).is_err());

        let cli = Settings::for_trigger(f, &Trigger::Cli).unwrap();
        assert!(cli.log_id.starts_with("monitor_cli_"));
    }

    #[test]
    fn test_defaults_and_scheme_added() {
        let settings = Settings::try_from(file("example.com")).unwrap();
        assert_eq!(settings.site_url, "http://example.com");
        assert!(settings.ignore_outer_urls);
        assert_eq!(settings.max_load_time, 1.0);
        assert_eq!(settings.email_level, Level::Info);
        assert_eq!(settings.base_links_file, PathBuf::from("output/base-links.txt"));
    }

    #[test]
    fn test_bad_regex_and_selector_rejected() {
        let mut f = file("https://example.com");
        f.ignored_urls = Some(vec!["(".to_string()]);
        assert!(matches!(
            Settings::try_from(f).unwrap_err(),
            MonitorError::InvalidSettings { field: "ignored_urls", .. }
        ));

        let mut f = file("https://example.com");
        f.menu_links_selector = Some("###".to_string());
        assert!(matches!(
            Settings::try_from(f).unwrap_err(),
            MonitorError::InvalidSettings { field: "menu_links_selector", .. }
        ));
    }

    #[test]
    fn test_log_id_must_be_key_safe() {
        let mut f = file("https://example.com");
        f.log_id = Some("../etc".to_string());
        assert!(Settings::try_from(f).is_err());
    }

    #[test]
    fn test_settings_survive_json_round_trip() {
        let mut f = file("https://example.com");
        f.ignored_urls = Some(vec!["/wp-admin".to_string()]);
        f.required_elements = Some(BTreeMap::from([(
            "about".to_string(),
            "#team".to_string(),
        )]));
        let settings = Settings::try_from(f).unwrap();
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ignored_urls, vec!["/wp-admin"]);
        assert_eq!(back.element_rules().len(), 1);
        assert_eq!(back.scope().site().host(), "example.com");
    }

    #[test]
    fn test_authorize() {
        let mut f = file("https://example.com");
        f.allowed_ip = Some("10.0.0.1".to_string());
        let settings = Settings::try_from(f).unwrap();

        assert!(Trigger::Cli.authorize(&settings).is_ok());
        let good = Trigger::Web { caller_ip: "10.0.0.1".into(), internal: false };
        assert!(good.authorize(&settings).is_ok());
        let bad = Trigger::Web { caller_ip: "10.0.0.2".into(), internal: false };
        assert!(matches!(bad.authorize(&settings), Err(MonitorError::AccessDenied(_))));
        let internal = Trigger::Web { caller_ip: "10.0.0.2".into(), internal: true };
        assert!(internal.authorize(&settings).is_ok());
    }
}
