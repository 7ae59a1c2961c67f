// src/crawl/resumable.rs
// =============================================================================
// Resumable crawls: one URL per tick, state persisted in between.
//
// start:  authorize, seed (site root + menu), persist, enqueue every pending
//         link, request a dispatch.
// tick:   reload state, top up the queue, pop one item, process it, persist,
//         enqueue whatever became pending, request a dispatch. An empty queue
//         means the run is over: complete, deliver, persist, drop the batch.
//
// Nothing lives in memory across ticks. The persisted state is only written
// after a step has fully finished, and the queue is always topped up from
// the frontier's pending links before popping. So if the process dies at any
// point, the next tick still sees every unprocessed link exactly once, and an
// already visited link that is popped again is skipped without a fetch.
// =============================================================================

use crate::checker::PageFetcher;
use crate::config::{Settings, Trigger};
use crate::error::{MonitorError, Result};
use crate::report::{Report, ReportSink};
use crate::store::StateStore;

use super::driver::{Mode, Monitor, StepKind};
use super::queue::{QueueItem, Scheduler};
use super::state::{data_key, CrawlState};

/// Result of one tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// One queued URL was handled.
    Processed {
        url: String,
        step: StepKind,
        remaining: usize,
    },
    /// The queue was empty; the run has been completed by this tick.
    Completed(Report),
    /// The run was completed by an earlier tick. Nothing was done.
    AlreadyComplete,
}

type CompletionCallback = Box<dyn FnMut(&Report) + Send>;

pub struct ResumableCrawl<F, S, Q> {
    fetcher: F,
    store: S,
    scheduler: Q,
    sinks: Vec<Box<dyn ReportSink>>,
    callbacks: Vec<CompletionCallback>,
}

impl<F, S, Q> ResumableCrawl<F, S, Q>
where
    F: PageFetcher,
    S: StateStore,
    Q: Scheduler,
{
    pub fn new(fetcher: F, store: S, scheduler: Q) -> Self {
        ResumableCrawl {
            fetcher,
            store,
            scheduler,
            sinks: Vec::new(),
            callbacks: Vec::new(),
        }
    }

    /// Adds a destination for the final report.
    pub fn with_sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Registers a callback run once, by the tick that completes the run.
    pub fn on_complete(&mut self, callback: impl FnMut(&Report) + Send + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn scheduler(&self) -> &Q {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Q {
        &mut self.scheduler
    }

    /// Loads the persisted state of a run.
    pub fn state(&self, log_id: &str) -> Result<CrawlState> {
        self.store
            .load(&data_key(log_id))?
            .ok_or_else(|| MonitorError::UnknownRun(log_id.to_string()))
    }

    /// Starts a run and returns its data key. Access is checked before
    /// anything is fetched.
    pub async fn start(&mut self, settings: Settings, trigger: &Trigger) -> Result<String> {
        trigger.authorize(&settings)?;

        let log_id = settings.log_id.clone();
        let key = data_key(&log_id);

        let mut monitor = Monitor::new(settings, &self.fetcher, Mode::Resumable);
        monitor.start().await;
        let state = monitor.into_state();

        self.store.save(&key, &state)?;
        let queued = self.enqueue_pending(&state)?;
        self.scheduler.dispatch(&log_id)?;

        tracing::info!(log_id = %log_id, queued, "resumable crawl started");
        Ok(key)
    }

    /// Runs one tick of the run identified by `log_id`.
    pub async fn tick(&mut self, log_id: &str) -> Result<TickOutcome> {
        let key = data_key(log_id);
        let state = self.state(log_id)?;
        if state.completed {
            return Ok(TickOutcome::AlreadyComplete);
        }

        // Repairs a queue that lost items when an earlier tick died between
        // popping and persisting. A no-op otherwise.
        self.enqueue_pending(&state)?;

        let item = match self.scheduler.next_tick(log_id)? {
            Some(item) => item,
            None => return self.finish(state).await,
        };

        let mut monitor = Monitor::resume(state, &self.fetcher);
        let outcome = monitor.process_one(&item.url).await;
        let state = monitor.into_state();
        self.store.save(&key, &state)?;

        self.enqueue_pending(&state)?;
        let remaining = self.scheduler.len(log_id)?;
        self.scheduler.dispatch(log_id)?;

        tracing::debug!(log_id, url = %item.url, remaining, "tick processed");
        Ok(TickOutcome::Processed {
            url: item.url,
            step: outcome.kind(),
            remaining,
        })
    }

    /// Ticks until the run completes. Stands in for an external scheduler.
    pub async fn drain(&mut self, log_id: &str) -> Result<Option<Report>> {
        loop {
            match self.tick(log_id).await? {
                TickOutcome::Processed { .. } => continue,
                TickOutcome::Completed(report) => return Ok(Some(report)),
                TickOutcome::AlreadyComplete => return Ok(None),
            }
        }
    }

    async fn finish(&mut self, state: CrawlState) -> Result<TickOutcome> {
        let log_id = state.log_id().to_string();
        let mut monitor = Monitor::resume(state, &self.fetcher);
        let report = monitor.complete()?;
        let state = monitor.into_state();

        // Delivered before the completed state is stored: if delivery fails
        // the next tick completes again.
        for sink in &mut self.sinks {
            sink.deliver(&report)?;
        }

        self.store.save(&data_key(&log_id), &state)?;
        self.scheduler.on_complete(&log_id)?;

        for callback in &mut self.callbacks {
            callback(&report);
        }

        tracing::info!(log_id = %log_id, visited = report.visited, "resumable crawl completed");
        Ok(TickOutcome::Completed(report))
    }

    /// Enqueues every pending link of the run; the scheduler merges the ones
    /// already waiting.
    fn enqueue_pending(&mut self, state: &CrawlState) -> Result<usize> {
        let items = state
            .frontier
            .pending()
            .into_iter()
            .map(|url| QueueItem::new(state.log_id(), url))
            .collect();
        self.scheduler.enqueue_all(items)
    }
}
