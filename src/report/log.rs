// src/report/log.rs
// =============================================================================
// Leveled log records.
//
// Every message the crawl produces is both emitted through `tracing` (so the
// CLI streams it as it happens) and kept in a `LogBook`, which is persisted
// with the crawl state and later filtered into the report.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Log,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Log => "log",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogBook {
    log_id: String,
    records: Vec<LogRecord>,
}

impl LogBook {
    pub fn new(log_id: impl Into<String>) -> Self {
        LogBook {
            log_id: log_id.into(),
            records: Vec::new(),
        }
    }

    /// Records a message. Errors are wrapped in `*** ... ***` so they stand
    /// out in the plain-text report.
    pub fn push(&mut self, level: Level, message: impl Into<String>) {
        let mut message = message.into();
        if level == Level::Error {
            message = format!("*** {} ***", message);
        }

        let log_id = self.log_id.as_str();
        match level {
            Level::Log | Level::Info => tracing::info!(log_id = %log_id, "{}", message),
            Level::Warning => tracing::warn!(log_id = %log_id, "{}", message),
            Level::Error => tracing::error!(log_id = %log_id, "{}", message),
        }

        self.records.push(LogRecord { level, message });
    }

    pub fn log(&mut self, message: impl Into<String>) {
        self.push(Level::Log, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Level::Info, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Level::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Level::Error, message);
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Records at or above `min`, in the order they were logged.
    pub fn at_least(&self, min: Level) -> Vec<LogRecord> {
        self.records
            .iter()
            .filter(|r| r.level >= min)
            .cloned()
            .collect()
    }
}
