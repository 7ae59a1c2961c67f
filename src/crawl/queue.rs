// src/crawl/queue.rs
// =============================================================================
// The work queue for resumable crawls.
//
// In resumable mode nothing is processed inline: every link waiting to be
// fetched becomes a QueueItem, and whoever drives the ticks (a cron job, a web
// hook, the `drain` command) pops one item per tick.
//
// Items are grouped into batches keyed by the run's log id. Pushing an item
// that is already waiting in its batch is a no-op, so repeated or overlapping
// dispatches can never make a URL show up twice.
//
// Rust concepts:
// - Traits: `Scheduler` is the seam; the engine never knows where the queue lives
// - VecDeque: FIFO order, push_back / pop_front
// =============================================================================

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::write_atomic;

use super::state::batch_key;

/// One pending URL of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub log_id: String,
    pub url: String,
}

impl QueueItem {
    pub fn new(log_id: impl Into<String>, url: impl Into<String>) -> Self {
        QueueItem {
            log_id: log_id.into(),
            url: url.into(),
        }
    }

    pub fn batch_key(&self) -> String {
        batch_key(&self.log_id)
    }
}

/// External driver of resumable crawls.
pub trait Scheduler: Send {
    /// Appends `item` to its batch. Returns false when the same URL is
    /// already waiting there.
    fn enqueue(&mut self, item: QueueItem) -> Result<bool>;

    /// Enqueues each item in order, returning how many were new.
    fn enqueue_all(&mut self, items: Vec<QueueItem>) -> Result<usize> {
        let mut added = 0;
        for item in items {
            if self.enqueue(item)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Requests another tick for the run.
    fn dispatch(&mut self, log_id: &str) -> Result<()>;

    /// Removes and returns the next item of the run, `None` when the batch is
    /// empty.
    fn next_tick(&mut self, log_id: &str) -> Result<Option<QueueItem>>;

    /// Called once the run has completed; drops the batch.
    fn on_complete(&mut self, log_id: &str) -> Result<()>;

    /// Number of items waiting for the run.
    fn len(&self, log_id: &str) -> Result<usize>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Batch {
    items: VecDeque<QueueItem>,
    dispatched: bool,
}

impl Batch {
    fn push(&mut self, item: QueueItem) -> bool {
        if self.items.iter().any(|queued| queued.url == item.url) {
            return false;
        }
        self.items.push_back(item);
        true
    }
}

/// In-process scheduler. Keeps a count of dispatch requests so callers (and
/// tests) can see whether more ticks were asked for.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    batches: HashMap<String, Batch>,
    dispatches: usize,
}

impl MemoryQueue {
    pub fn new() -> Self {
        MemoryQueue::default()
    }

    pub fn dispatches(&self) -> usize {
        self.dispatches
    }
}

impl Scheduler for MemoryQueue {
    fn enqueue(&mut self, item: QueueItem) -> Result<bool> {
        Ok(self.batches.entry(item.batch_key()).or_default().push(item))
    }

    fn dispatch(&mut self, log_id: &str) -> Result<()> {
        self.batches.entry(batch_key(log_id)).or_default().dispatched = true;
        self.dispatches += 1;
        Ok(())
    }

    fn next_tick(&mut self, log_id: &str) -> Result<Option<QueueItem>> {
        Ok(self
            .batches
            .get_mut(&batch_key(log_id))
            .and_then(|batch| batch.items.pop_front()))
    }

    fn on_complete(&mut self, log_id: &str) -> Result<()> {
        self.batches.remove(&batch_key(log_id));
        Ok(())
    }

    fn len(&self, log_id: &str) -> Result<usize> {
        Ok(self
            .batches
            .get(&batch_key(log_id))
            .map_or(0, |batch| batch.items.len()))
    }
}

/// Scheduler persisted as one JSON file per batch, so a queue survives the
/// process between ticks.
#[derive(Debug, Clone)]
pub struct FileQueue {
    dir: PathBuf,
}

impl FileQueue {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(FileQueue { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn load(&self, key: &str) -> Result<Batch> {
        match fs::read_to_string(self.path(key)) {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Batch::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, batch: &Batch) -> Result<()> {
        write_atomic(&self.path(key), &serde_json::to_vec(batch)?)
    }

    /// Whether a tick was requested and not yet served.
    pub fn is_dispatched(&self, log_id: &str) -> Result<bool> {
        Ok(self.load(&batch_key(log_id))?.dispatched)
    }
}

impl Scheduler for FileQueue {
    fn enqueue(&mut self, item: QueueItem) -> Result<bool> {
        let key = item.batch_key();
        let mut batch = self.load(&key)?;
        let added = batch.push(item);
        if added {
            self.save(&key, &batch)?;
        }
        Ok(added)
    }

    // One read and at most one write per batch instead of one per item.
    fn enqueue_all(&mut self, items: Vec<QueueItem>) -> Result<usize> {
        let mut batches: HashMap<String, Batch> = HashMap::new();
        let mut added = 0;
        for item in items {
            let key = item.batch_key();
            if !batches.contains_key(&key) {
                let batch = self.load(&key)?;
                batches.insert(key.clone(), batch);
            }
            if let Some(batch) = batches.get_mut(&key) {
                if batch.push(item) {
                    added += 1;
                }
            }
        }
        if added > 0 {
            for (key, batch) in &batches {
                self.save(key, batch)?;
            }
        }
        Ok(added)
    }

    fn dispatch(&mut self, log_id: &str) -> Result<()> {
        let key = batch_key(log_id);
        let mut batch = self.load(&key)?;
        batch.dispatched = true;
        self.save(&key, &batch)?;
        tracing::debug!(batch = %key, waiting = batch.items.len(), "dispatch requested");
        Ok(())
    }

    fn next_tick(&mut self, log_id: &str) -> Result<Option<QueueItem>> {
        let key = batch_key(log_id);
        let mut batch = self.load(&key)?;
        batch.dispatched = false;
        let item = batch.items.pop_front();
        self.save(&key, &batch)?;
        Ok(item)
    }

    fn on_complete(&mut self, log_id: &str) -> Result<()> {
        match fs::remove_file(self.path(&batch_key(log_id))) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn len(&self, log_id: &str) -> Result<usize> {
        Ok(self.load(&batch_key(log_id))?.items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(queue: &mut dyn Scheduler) {
        assert!(queue.enqueue(QueueItem::new("run", "https://example.com/a")).unwrap());
        assert!(queue.enqueue(QueueItem::new("run", "https://example.com/b")).unwrap());
        // same batch, same url: merged
        assert!(!queue.enqueue(QueueItem::new("run", "https://example.com/a")).unwrap());
        // other run: separate batch
        assert!(queue.enqueue(QueueItem::new("other", "https://example.com/a")).unwrap());
        assert_eq!(queue.len("run").unwrap(), 2);

        let first = queue.next_tick("run").unwrap().unwrap();
        assert_eq!(first.url, "https://example.com/a");
        let second = queue.next_tick("run").unwrap().unwrap();
        assert_eq!(second.url, "https://example.com/b");
        assert!(queue.next_tick("run").unwrap().is_none());

        queue.on_complete("run").unwrap();
        assert_eq!(queue.len("run").unwrap(), 0);
        assert_eq!(queue.len("other").unwrap(), 1);
    }

    #[test]
    fn test_memory_queue() {
        let mut queue = MemoryQueue::new();
        exercise(&mut queue);
        queue.dispatch("run").unwrap();
        assert_eq!(queue.dispatches(), 1);
    }

    #[test]
    fn test_file_queue() {
        let dir = tempfile::tempdir().unwrap();
        let mut queue = FileQueue::new(dir.path()).unwrap();
        exercise(&mut queue);
    }

    #[test]
    fn test_file_queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut queue = FileQueue::new(dir.path()).unwrap();
            queue.enqueue(QueueItem::new("run", "https://example.com/a")).unwrap();
            queue.dispatch("run").unwrap();
        }
        let mut reopened = FileQueue::new(dir.path()).unwrap();
        assert!(reopened.is_dispatched("run").unwrap());
        let item = reopened.next_tick("run").unwrap().unwrap();
        assert_eq!(item, QueueItem::new("run", "https://example.com/a"));
        assert!(!reopened.is_dispatched("run").unwrap());
    }
}
