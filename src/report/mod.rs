// src/report/mod.rs
// =============================================================================
// Everything the run produces for a human: leveled log records, the baseline
// diff, and the rendered report.
//
// Submodules:
// - log: Level enum and the log accumulator
// - diff: natural sort and the added/removed comparison
// - baseline: the base links file
//
// Delivery is behind the `ReportSink` trait. The crate ships sinks for plain
// text, HTML files and JSON; mail transport is left to whoever implements a
// sink for it.
// =============================================================================

mod baseline;
mod diff;
mod log;

pub use baseline::{Baseline, BaselineOutcome};
pub use diff::{classify, compare, natural_cmp, sort_links, to_table, to_text, DiffEntry, DiffStatus};
pub use log::{Level, LogBook, LogRecord};

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

const REPORT_STYLE: &str = "<style>\
.diff { width: 100%; }\
.diff td { width: 50%; vertical-align: top; white-space: pre-wrap; }\
.diffUnmodified { display: none; }\
.diffDeleted span { border: 1px solid #ffc0c0; background: #ffe0e0; }\
.diffInserted span { border: 1px solid #c0ffc0; background: #e0ffe0; }\
</style>";

/// The finished run, ready to be rendered or serialized.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub subject: String,
    pub site_url: String,
    pub log_id: String,
    pub from: String,
    pub to: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub links: usize,
    pub visited: usize,
    pub broken: Vec<String>,
    /// Records at or above the configured report level.
    pub records: Vec<LogRecord>,
    pub diffs: Vec<DiffEntry>,
}

impl Report {
    pub fn subject_for(site_url: &str) -> String {
        format!("Report on {} monitoring.", site_url)
    }

    /// True when the run found something worth failing a CI job over.
    pub fn has_errors(&self) -> bool {
        self.records.iter().any(|r| r.level == Level::Error)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&record.message);
            out.push('\n');
        }
        if !self.diffs.is_empty() {
            out.push_str("\nDifferences with base links file:\n");
            out.push_str(&to_text(&self.diffs));
        }
        out
    }

    pub fn render_html(&self) -> String {
        let mut html = format!("<html><head>{}</head><body>\n", REPORT_STYLE);

        let lines: Vec<String> = self
            .records
            .iter()
            .map(|r| escape_html(&r.message))
            .collect();
        html.push_str(&lines.join("<br>\n"));

        if !self.diffs.is_empty() {
            html.push_str("<p><strong>Differences with base links file:</strong></p>\n");
            html.push_str("<table class=\"diff\"><tbody><tr>");
            html.push_str("<td><strong>Removed links</strong></td>");
            html.push_str("<td><strong>Added links</strong></td>");
            html.push_str("</tr></tbody></table>\n");
            html.push_str(&to_table(&self.diffs));
        }

        html.push_str("</body></html>\n");
        html
    }
}

/// Somewhere a finished report goes.
pub trait ReportSink: Send {
    fn deliver(&mut self, report: &Report) -> Result<()>;
}

/// Writes the plain-text rendering to any writer (stdout in the CLI).
pub struct TextSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> TextSink<W> {
    pub fn new(out: W) -> Self {
        TextSink { out }
    }
}

impl<W: Write + Send> ReportSink for TextSink<W> {
    fn deliver(&mut self, report: &Report) -> Result<()> {
        self.out.write_all(report.render_text().as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

/// Pretty-printed JSON of the whole report.
pub struct JsonSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(out: W) -> Self {
        JsonSink { out }
    }
}

impl<W: Write + Send> ReportSink for JsonSink<W> {
    fn deliver(&mut self, report: &Report) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.out, report)?;
        writeln!(self.out)?;
        Ok(())
    }
}

/// Saves the HTML rendering, i.e. the document a mailer would send.
pub struct HtmlFileSink {
    path: PathBuf,
}

impl HtmlFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        HtmlFileSink { path: path.into() }
    }
}

impl ReportSink for HtmlFileSink {
    fn deliver(&mut self, report: &Report) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, report.render_html())?;
        tracing::info!(path = %self.path.display(), "report written");
        Ok(())
    }
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(diffs: Vec<DiffEntry>) -> Report {
        Report {
            subject: Report::subject_for("https://example.com"),
            site_url: "https://example.com".into(),
            log_id: "run".into(),
            from: String::new(),
            to: "ops@example.com".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            links: 2,
            visited: 1,
            broken: vec!["https://example.com/gone".into()],
            records: vec![
                LogRecord { level: Level::Info, message: "There are 2 links on site.".into() },
                LogRecord { level: Level::Error, message: "*** https://example.com/gone ***".into() },
            ],
            diffs,
        }
    }

    #[test]
    fn test_subject() {
        assert_eq!(report(vec![]).subject, "Report on https://example.com monitoring.");
    }

    #[test]
    fn test_text_rendering_includes_diff() {
        let r = report(compare(&["https://example.com/old"], &["https://example.com/new"]));
        let text = r.render_text();
        assert!(text.starts_with("There are 2 links on site.\n"));
        assert!(text.contains("Differences with base links file:\n+ https://example.com/new\n- https://example.com/old\n"));
        assert!(r.has_errors());
    }

    #[test]
    fn test_html_rendering_without_diff_has_no_table() {
        let html = report(vec![]).render_html();
        assert!(html.contains("There are 2 links on site.<br>\n*** https://example.com/gone ***"));
        assert!(!html.contains("Removed links"));
    }

    #[test]
    fn test_json_sink() {
        let mut buf = Vec::new();
        JsonSink::new(&mut buf).deliver(&report(vec![])).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["visited"], 1);
        assert_eq!(value["records"][1]["level"], "error");
    }

    #[test]
    fn test_html_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/run.html");
        HtmlFileSink::new(&path).deliver(&report(vec![])).unwrap();
        assert!(fs::read_to_string(&path).unwrap().starts_with("<html>"));
    }
}
