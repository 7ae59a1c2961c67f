// src/crawl/state.rs
// =============================================================================
// The crawl snapshot that crosses tick boundaries in resumable mode.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::report::{DiffEntry, LogBook};

use super::frontier::Frontier;

const KEY_PREFIX: &str = "site_monitor";

/// Storage key of a run's crawl state.
pub fn data_key(log_id: &str) -> String {
    format!("{}_data_{}", KEY_PREFIX, log_id)
}

/// Queue key of a run. Derived from the log id alone, so repeated or merged
/// dispatches for the same run always land in the same batch.
pub fn batch_key(log_id: &str) -> String {
    format!("{}_batch_{}", KEY_PREFIX, log_id)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlState {
    pub settings: Settings,
    pub log: LogBook,
    pub frontier: Frontier,
    pub diffs: Vec<DiffEntry>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub completed: bool,
}

impl CrawlState {
    pub fn new(settings: Settings) -> Self {
        CrawlState {
            log: LogBook::new(settings.log_id.clone()),
            settings,
            frontier: Frontier::new(),
            diffs: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            completed: false,
        }
    }

    pub fn log_id(&self) -> &str {
        &self.settings.log_id
    }
}
