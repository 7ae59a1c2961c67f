// src/error.rs
// =============================================================================
// Error types for the monitor library.
//
// Two families:
// - MonitorError: fatal problems raised at entry points (access, settings,
//   storage). These reach the caller.
// - FetchError (in checker/): per-URL failures. These never escape the crawl
//   loop; the URL is marked broken and the run continues.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// The caller's IP is not the configured `allowed_ip`.
    #[error("Not allowed: caller {0} is not allow-listed")]
    AccessDenied(String),

    /// A required setting is absent.
    #[error("'{0}' must be defined in settings")]
    ConfigMissing(&'static str),

    /// A setting is present but unusable (bad URL, regex, selector...).
    #[error("invalid setting '{field}': {reason}")]
    InvalidSettings { field: &'static str, reason: String },

    /// No persisted state exists for the run.
    #[error("no crawl state stored for run '{0}'")]
    UnknownRun(String),

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MonitorError {
    pub(crate) fn invalid(field: &'static str, reason: impl ToString) -> Self {
        MonitorError::InvalidSettings {
            field,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = MonitorError> = std::result::Result<T, E>;
