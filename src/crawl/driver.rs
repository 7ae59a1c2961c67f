// src/crawl/driver.rs
// =============================================================================
// The crawl driver.
//
// One step function, `process_one`, does all the per-URL work:
//
//   1. accept the link into the frontier (or stop)
//   2. stop if it was already visited
//   3. fetch it
//   4. failure: log an error, mark it broken, stop
//   5. success: log title and progress, mark it visited
//   6. warn when it loaded slower than max_load_time
//   7. on-site pages: markup checks, optional content saving, feed the
//      page's anchors back into the frontier
//   8. notify page hooks
//
// The two modes only differ in who calls it next. `Mode::Sync` walks the
// frontier in discovery order until nothing is left. `Mode::Resumable` stops
// after seeding and leaves the rest to the queue (see resumable.rs).
// =============================================================================

use std::fmt;
use std::path::PathBuf;

use chrono::Utc;

use crate::checker::{has_element, select_hrefs, FetchError, FetchedPage, PageFetcher};
use crate::config::Settings;
use crate::error::Result;
use crate::report::{sort_links, Baseline, BaselineOutcome, Report};

use super::frontier::Frontier;
use super::state::CrawlState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Drain the frontier in this process.
    Sync,
    /// Seed only; each further URL is processed by its own tick.
    Resumable,
}

/// What `process_one` did with a URL, without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Skipped,
    Broken,
    Visited,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepKind::Skipped => "skipped",
            StepKind::Broken => "broken",
            StepKind::Visited => "visited",
        };
        f.write_str(name)
    }
}

/// What `process_one` did with a URL.
#[derive(Debug)]
pub enum StepOutcome {
    /// Rejected by the frontier or already visited. Nothing was fetched.
    Skipped,
    /// The fetch failed; the URL is now broken.
    Broken(FetchError),
    /// The page loaded.
    Visited(Box<FetchedPage>),
}

impl StepOutcome {
    pub fn kind(&self) -> StepKind {
        match self {
            StepOutcome::Skipped => StepKind::Skipped,
            StepOutcome::Broken(_) => StepKind::Broken,
            StepOutcome::Visited(_) => StepKind::Visited,
        }
    }
}

/// Progress shown when a page is checked. The count of visited pages does not
/// include the current page yet, so the first page always reports 0%.
pub fn completion_percent(visited_before: usize, total_links: usize) -> u32 {
    if visited_before == 0 || total_links == 0 {
        return 0;
    }
    ((visited_before + 1) * 100 / total_links) as u32
}

type PageHook = Box<dyn FnMut(&str) + Send>;

pub struct Monitor<F> {
    state: CrawlState,
    fetcher: F,
    mode: Mode,
    hooks: Vec<PageHook>,
}

impl<F: PageFetcher> Monitor<F> {
    /// A fresh run.
    pub fn new(settings: Settings, fetcher: F, mode: Mode) -> Self {
        Monitor {
            state: CrawlState::new(settings),
            fetcher,
            mode,
            hooks: Vec::new(),
        }
    }

    /// Picks up a persisted run.
    pub fn resume(state: CrawlState, fetcher: F) -> Self {
        Monitor {
            state,
            fetcher,
            mode: Mode::Resumable,
            hooks: Vec::new(),
        }
    }

    /// Registers a callback invoked with every processed URL.
    pub fn on_page(&mut self, hook: impl FnMut(&str) + Send + 'static) {
        self.hooks.push(Box::new(hook));
    }

    pub fn frontier(&self) -> &Frontier {
        &self.state.frontier
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn into_state(self) -> CrawlState {
        self.state
    }

    /// Processes a single URL. Never fails: fetch problems end up in the
    /// broken set and the log.
    pub async fn process_one(&mut self, url: &str) -> StepOutcome {
        let state = &mut self.state;
        if !state.frontier.add_link(url, state.settings.scope()) {
            return StepOutcome::Skipped;
        }
        let url = match state.settings.scope().normalize(url) {
            Some(url) => url,
            None => return StepOutcome::Skipped,
        };
        if state.frontier.is_visited(&url) {
            return StepOutcome::Skipped;
        }

        let page = match self.fetcher.fetch(&url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::debug!(url = %url, reason = %e, "fetch failed");
                let state = &mut self.state;
                state.log.error(format!("Cannot load \"{}\" page.", url));
                state.frontier.mark_broken(&url);
                return StepOutcome::Broken(e);
            }
        };

        let percent = completion_percent(
            self.state.frontier.visited().len(),
            self.state.frontier.links().len(),
        );
        self.state.log.info(format!(
            "Checking \"{}\" page ({}). {}%",
            page.title, url, percent
        ));
        self.state.frontier.mark_visited(&url);

        let seconds = page.elapsed.as_secs_f64();
        if seconds > self.state.settings.max_load_time {
            self.state.log.warning(format!(
                "Slow loading of {} page. {:.3} seconds.",
                url, seconds
            ));
        }

        if !self.state.settings.scope().is_outer(&url) {
            self.check_required_markup(&url, &page);
            self.maybe_save_content(&url, &page).await;

            let state = &mut self.state;
            for anchor in &page.anchors {
                if state.settings.skip_nofollow && anchor.is_nofollow() {
                    continue;
                }
                state.frontier.add_link(&anchor.href, state.settings.scope());
            }
        }

        for hook in &mut self.hooks {
            hook(&url);
        }

        StepOutcome::Visited(Box::new(page))
    }

    fn check_required_markup(&mut self, url: &str, page: &FetchedPage) {
        let state = &mut self.state;

        for (name, expected) in &state.settings.required_headers {
            if page.header(name) != Some(expected.as_str()) {
                state.log.warning(format!(
                    "Page {} does not contain required header \"{}: {}\".",
                    url, name, expected
                ));
            }
        }

        for rule in state.settings.element_rules() {
            if rule.pattern.is_match(url) && !has_element(&page.content, &rule.selector) {
                state.log.error(format!(
                    "Page {} does not contain required element \"{}\".",
                    url, rule.selector
                ));
            }
        }
    }

    async fn maybe_save_content(&mut self, url: &str, page: &FetchedPage) {
        if !self.state.settings.save_content {
            return;
        }

        let filename = content_path(&self.state.settings.content_dir, url);
        if let Some(dir) = filename.parent() {
            if let Err(e) = tokio::fs::create_dir_all(dir).await {
                self.state.log.error(format!(
                    "Cannot create directory \"{}\": {}.",
                    dir.display(),
                    e
                ));
                return;
            }
        }
        if let Err(e) = tokio::fs::write(&filename, &page.content).await {
            self.state.log.error(format!(
                "Cannot save content of {} to \"{}\": {}.",
                url,
                filename.display(),
                e
            ));
        }
    }

    /// Loads the site root and, when a menu selector is configured, adds the
    /// menu's links to the frontier.
    pub async fn seed(&mut self) {
        let site_url = self.state.settings.site_url.clone();
        let seed = self
            .state
            .settings
            .scope()
            .normalize(&site_url)
            .unwrap_or(site_url);

        let outcome = self.process_one(&seed).await;

        let selector = self.state.settings.menu_links_selector.clone();
        if selector.is_empty() {
            return;
        }
        let page = match outcome {
            StepOutcome::Visited(page) => page,
            _ => {
                self.state
                    .log
                    .log("Start page did not load, menu links skipped.");
                return;
            }
        };

        self.state.log.log("Checking pages in menu...");
        let hrefs = select_hrefs(&page.content, &selector);
        self.state
            .log
            .log(format!("Found {} links in menu.", hrefs.len()));

        let state = &mut self.state;
        for href in &hrefs {
            state.frontier.add_link(href, state.settings.scope());
        }
    }

    /// Processes every link not visited yet, including links discovered on
    /// the way, in discovery order.
    pub async fn walk(&mut self) {
        self.state.log.log("Walking on links...");
        self.state.log.log(format!(
            "Found {} links in total.",
            self.state.frontier.links().len()
        ));

        let mut i = 0;
        while let Some(url) = self.state.frontier.links().get(i).map(str::to_string) {
            if !self.state.frontier.is_visited(&url) {
                self.process_one(&url).await;
            }
            i += 1;
        }
    }

    /// Seeds the run. In synchronous mode the whole site is walked as well.
    pub async fn start(&mut self) {
        tracing::info!(
            log_id = %self.state.settings.log_id,
            site = %self.state.settings.site_url,
            mode = ?self.mode,
            "starting checks"
        );
        self.state.log.log("Starting checks.");
        self.seed().await;

        match self.mode {
            Mode::Sync => self.walk().await,
            Mode::Resumable => self.state.log.log(format!(
                "Queued {} links.",
                self.state.frontier.pending().len()
            )),
        }
    }

    /// Summarizes the run, updates or compares the baseline, and builds the
    /// report.
    pub fn complete(&mut self) -> Result<Report> {
        let state = &mut self.state;

        state.log.info(format!(
            "There are {} links on site.",
            state.frontier.links().len()
        ));
        state.log.info(format!(
            "There are {} visited.",
            state.frontier.visited().len()
        ));

        let not_visited = state.frontier.unvisited();
        if !not_visited.is_empty() {
            state.log.info("Not visited:");
            for url in &not_visited {
                state.log.error(url.as_str());
            }
        }

        let sorted = sort_links(state.frontier.links().iter());
        let baseline = Baseline::new(&state.settings.base_links_file);
        match baseline.create_or_compare(&sorted)? {
            BaselineOutcome::Created => {
                state.log.info(format!(
                    "Base links file created: {}.",
                    baseline.path().display()
                ));
                state.diffs.clear();
            }
            BaselineOutcome::Compared(diffs) => {
                if !diffs.is_empty() {
                    state.log.info(format!(
                        "Found {} differences with base links file.",
                        diffs.len()
                    ));
                }
                state.diffs = diffs;
            }
        }

        let finished_at = Utc::now();
        let elapsed = (finished_at - state.started_at).num_milliseconds() as f64 / 1000.0;
        state
            .log
            .info(format!("Time elapsed: {:.3} seconds.", elapsed));
        state.finished_at = Some(finished_at);
        state.completed = true;

        let settings = &state.settings;
        Ok(Report {
            subject: Report::subject_for(&settings.site_url),
            site_url: settings.site_url.clone(),
            log_id: settings.log_id.clone(),
            from: settings.from.clone(),
            to: settings.to.clone(),
            started_at: state.started_at,
            finished_at,
            links: state.frontier.links().len(),
            visited: state.frontier.visited().len(),
            broken: state.frontier.broken().iter().map(str::to_string).collect(),
            records: state.log.at_least(settings.email_level),
            diffs: state.diffs.clone(),
        })
    }
}

/// Synchronous run from start to report.
pub async fn run_sync<F: PageFetcher>(settings: Settings, fetcher: F) -> Result<(Report, CrawlState)> {
    let mut monitor = Monitor::new(settings, fetcher, Mode::Sync);
    monitor.start().await;
    let report = monitor.complete()?;
    Ok((report, monitor.into_state()))
}

/// `<content_dir><path>.html`; the site root maps to `index.html`. Dot
/// segments are dropped so nothing is written outside `content_dir`.
fn content_path(content_dir: &std::path::Path, url: &str) -> PathBuf {
    let after_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = after_scheme
        .split_once('/')
        .map_or("", |(_, path)| path)
        .split('?')
        .next()
        .unwrap_or("");

    let segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();

    let mut file = content_dir.to_path_buf();
    match segments.split_last() {
        None => file.push("index.html"),
        Some((last, dirs)) => {
            for dir in dirs {
                file.push(dir);
            }
            file.push(format!("{}.html", last));
        }
    }
    file
}
