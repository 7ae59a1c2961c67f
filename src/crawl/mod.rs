// src/crawl/mod.rs
// =============================================================================
// This module handles crawling one site.
//
// Pieces, bottom-up:
// - normalize: turns raw hrefs into canonical absolute URLs
// - frontier:  links found so far, and which of them loaded or failed
// - state:     the snapshot persisted between ticks
// - queue:     pending URLs for resumable runs
// - driver:    the per-URL step and the synchronous walk
// - resumable: one URL per tick, with state in a store
//
// Rust concepts:
// - Generics: the driver works with any `PageFetcher`, the resumable crawl
//   with any `StateStore` and `Scheduler`
// - Ownership: the crawl state is moved in and out of the driver per tick
// =============================================================================

mod driver;
mod frontier;
mod normalize;
mod queue;
mod resumable;
mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use driver::{completion_percent, run_sync, Mode, Monitor, StepKind, StepOutcome};
pub use frontier::{Frontier, LinkSet, Scope};
pub use normalize::{is_outer_url, normalize, SiteUrl};
pub use queue::{FileQueue, MemoryQueue, QueueItem, Scheduler};
pub use resumable::{ResumableCrawl, TickOutcome};
pub use state::{batch_key, data_key, CrawlState};
