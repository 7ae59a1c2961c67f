// src/store.rs
// =============================================================================
// Key-value persistence for crawl state between ticks.
//
// Two implementations:
// - FileStore: one JSON document per key in a directory. Writes go to a
//   temporary file that is renamed over the target, so a reader never sees a
//   half-written snapshot even if the process dies mid-write.
// - MemoryStore: keeps the serialized JSON in a map. Used by tests, and it
//   still round-trips through serde so it behaves like a restart.
// =============================================================================

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::crawl::CrawlState;
use crate::error::Result;

pub trait StateStore: Send {
    fn load(&self, key: &str) -> Result<Option<CrawlState>>;
    fn save(&mut self, key: &str, state: &CrawlState) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(FileStore { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl StateStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<CrawlState>> {
        match fs::read_to_string(self.path(key)) {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, key: &str, state: &CrawlState) -> Result<()> {
        let json = serde_json::to_vec(state)?;
        write_atomic(&self.path(key), &json)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl StateStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<CrawlState>> {
        match self.entries.get(key) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, key: &str, state: &CrawlState) -> Result<()> {
        self.entries
            .insert(key.to_string(), serde_json::to_string(state)?);
        Ok(())
    }
}

/// Writes `bytes` next to `path` and renames it into place.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Settings, SettingsFile};

    fn state() -> CrawlState {
        let settings = Settings::try_from(SettingsFile {
            site_url: Some("https://example.com".into()),
            log_id: Some("run_1".into()),
            ..Default::default()
        })
        .unwrap();
        let mut state = CrawlState::new(settings);
        let scope = state.settings.scope().clone();
        state.frontier.add_link("/a", &scope);
        state.frontier.mark_broken("https://example.com/a");
        state.log.info("hello");
        state
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("state")).unwrap();
        assert!(store.load("k").unwrap().is_none());

        store.save("k", &state()).unwrap();
        let loaded = store.load("k").unwrap().unwrap();
        assert!(loaded.frontier.is_broken("https://example.com/a"));
        assert_eq!(loaded.log.records().len(), 1);
        assert_eq!(loaded.log_id(), "run_1");

        // saving again replaces the snapshot
        let mut changed = loaded;
        changed.completed = true;
        store.save("k", &changed).unwrap();
        assert!(store.load("k").unwrap().unwrap().completed);
        assert!(!dir.path().join("state").join("k.json.tmp").exists());
    }

    #[test]
    fn test_memory_store_round_trip() {
        let mut store = MemoryStore::new();
        store.save("k", &state()).unwrap();
        let loaded = store.load("k").unwrap().unwrap();
        assert_eq!(loaded.frontier.links().len(), 1);
    }
}
