// src/report/baseline.rs
// =============================================================================
// The baseline links file: one normalized URL per line, UTF-8, no header.
//
// The first run on a site writes it. Later runs only read it; updating the
// baseline is a deliberate manual step (delete or edit the file).
// =============================================================================

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::diff::{compare, sort_links, DiffEntry};

/// What happened to the baseline during completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaselineOutcome {
    /// No baseline existed; the current links were written as the new one.
    Created,
    /// The baseline was compared against the current links.
    Compared(Vec<DiffEntry>),
}

impl BaselineOutcome {
    pub fn diffs(&self) -> &[DiffEntry] {
        match self {
            BaselineOutcome::Created => &[],
            BaselineOutcome::Compared(diffs) => diffs,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Baseline {
    path: PathBuf,
}

impl Baseline {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Baseline { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the baseline, naturally sorted. `None` when the file is absent.
    pub fn load(&self) -> Result<Option<Vec<String>>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(sort_links(content.split('\n')))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Appends `links` one per line, in the given order.
    fn write(&self, links: &[String]) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        for link in links {
            writeln!(file, "{}", link)?;
        }
        Ok(())
    }

    /// Writes `sorted_links` as the baseline when none exists yet, otherwise
    /// diffs against the stored one without touching it.
    pub fn create_or_compare(&self, sorted_links: &[String]) -> Result<BaselineOutcome> {
        match self.load()? {
            None => {
                self.write(sorted_links)?;
                Ok(BaselineOutcome::Created)
            }
            Some(base) => Ok(BaselineOutcome::Compared(compare(&base, sorted_links))),
        }
    }
}
