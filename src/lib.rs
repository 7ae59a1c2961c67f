// src/lib.rs
// =============================================================================
// site-monitor: crawls one website, records every page that fails to load or
// loads slowly, and compares the discovered link set with a stored baseline.
//
// Modules:
// - config:  settings file, validation, caller authorization
// - checker: fetching pages and reading their HTML
// - crawl:   URL normalization, frontier, synchronous and resumable drivers
// - report:  log records, baseline diff, report rendering and sinks
// - store:   persistence of crawl state between ticks
// - error:   the library's error type
// =============================================================================

pub mod checker;
pub mod config;
pub mod crawl;
pub mod error;
pub mod report;
pub mod store;

pub use config::{Settings, SettingsFile, Trigger};
pub use crawl::{run_sync, CrawlState, Mode, Monitor, ResumableCrawl, TickOutcome};
pub use error::{MonitorError, Result};
pub use report::{Level, Report, ReportSink};
