// src/main.rs
// =============================================================================
// This is the entry point of the site-monitor CLI.
//
// What happens here:
// 1. Set up logging (tracing, filtered by RUST_LOG, written to stderr)
// 2. Parse command-line arguments using clap
// 3. Dispatch to the subcommand handler
// 4. Exit with proper code (0 = clean, 1 = report has errors, 2 = fatal error)
//
// The report itself goes to stdout, log lines go to stderr, so
// `site-monitor check --json > report.json` stays machine-readable.
// =============================================================================

mod cli;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use site_monitor::checker::HttpFetcher;
use site_monitor::crawl::{data_key, FileQueue, ResumableCrawl, Scheduler, TickOutcome};
use site_monitor::report::{HtmlFileSink, JsonSink, Report, ReportSink, TextSink};
use site_monitor::store::FileStore;
use site_monitor::{run_sync, Settings, SettingsFile, Trigger};

#[tokio::main]
async fn main() {
    init_logging();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("site_monitor=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

// Returns:
//   Ok(0) = run finished (or progressed) without ERROR records
//   Ok(1) = the report contains ERROR records
//   Err   = fatal error, mapped to exit code 2 by main
async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { settings, json, report } => handle_check(&settings, json, report).await,
        Commands::Start { settings, state_dir, caller_ip, internal } => {
            handle_start(&settings, &state_dir, caller_ip, internal).await
        }
        Commands::Tick { log_id, state_dir } => handle_tick(&log_id, &state_dir).await,
        Commands::Drain { log_id, state_dir, report } => {
            handle_drain(&log_id, &state_dir, report).await
        }
    }
}

fn load_settings(path: &Path, trigger: &Trigger) -> Result<Settings> {
    let file = SettingsFile::load(path)
        .with_context(|| format!("cannot read settings from {}", path.display()))?;
    Ok(Settings::for_trigger(file, trigger)?)
}

fn open_resumable(state_dir: &Path) -> Result<ResumableCrawl<HttpFetcher, FileStore, FileQueue>> {
    Ok(ResumableCrawl::new(
        HttpFetcher::new()?,
        FileStore::new(state_dir.join("state"))?,
        FileQueue::new(state_dir.join("queue"))?,
    ))
}

fn exit_code_for(report: &Report) -> i32 {
    if report.has_errors() {
        1
    } else {
        0
    }
}

// Handles the 'check' subcommand: a synchronous run from start to report.
async fn handle_check(settings_path: &Path, json: bool, html: Option<PathBuf>) -> Result<i32> {
    let settings = load_settings(settings_path, &Trigger::Cli)?;
    let (report, _) = run_sync(settings, HttpFetcher::new()?).await?;

    let mut sinks: Vec<Box<dyn ReportSink>> = Vec::new();
    if json {
        sinks.push(Box::new(JsonSink::new(io::stdout())));
    } else {
        sinks.push(Box::new(TextSink::new(io::stdout())));
    }
    if let Some(path) = html {
        sinks.push(Box::new(HtmlFileSink::new(path)));
    }
    for sink in &mut sinks {
        sink.deliver(&report)?;
    }

    Ok(exit_code_for(&report))
}

// Handles the 'start' subcommand. A caller IP (or --internal) makes this a
// web-style trigger that is checked against allowed_ip.
async fn handle_start(
    settings_path: &Path,
    state_dir: &Path,
    caller_ip: Option<String>,
    internal: bool,
) -> Result<i32> {
    let trigger = match (caller_ip, internal) {
        (None, false) => Trigger::Cli,
        (ip, internal) => Trigger::Web {
            caller_ip: ip.unwrap_or_default(),
            internal,
        },
    };

    // Web-style starts must name their run; only CLI starts get a generated id.
    let settings = load_settings(settings_path, &trigger)?;
    let log_id = settings.log_id.clone();

    let mut crawl = open_resumable(state_dir)?;
    let key = crawl.start(settings, &trigger).await?;
    let queued = crawl.scheduler().len(&log_id)?;

    println!("{}", log_id);
    tracing::info!(key = %key, queued, "resumable run started");
    Ok(0)
}

// Handles the 'tick' subcommand: exactly one unit of work.
async fn handle_tick(log_id: &str, state_dir: &Path) -> Result<i32> {
    let mut crawl = open_resumable(state_dir)?.with_sink(TextSink::new(io::stdout()));

    match crawl.tick(log_id).await? {
        TickOutcome::Processed { url, step, remaining } => {
            println!("{} {} ({} remaining)", step, url, remaining);
            Ok(0)
        }
        TickOutcome::Completed(report) => Ok(exit_code_for(&report)),
        TickOutcome::AlreadyComplete => {
            println!("run {} is already complete ({})", log_id, data_key(log_id));
            Ok(0)
        }
    }
}

// Handles the 'drain' subcommand: ticks until the run completes.
async fn handle_drain(log_id: &str, state_dir: &Path, html: Option<PathBuf>) -> Result<i32> {
    let mut crawl = open_resumable(state_dir)?.with_sink(TextSink::new(io::stdout()));
    if let Some(path) = html {
        crawl = crawl.with_sink(HtmlFileSink::new(path));
    }

    match crawl.drain(log_id).await? {
        Some(report) => Ok(exit_code_for(&report)),
        None => {
            println!("run {} is already complete ({})", log_id, data_key(log_id));
            Ok(0)
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why is main() not returning Result?
//    - We want exact exit codes (0/1/2); returning Err from main would always
//      exit with 1
//
// 2. What is Box<dyn ReportSink>?
//    - A trait object: the Vec can hold different sink types behind one
//      interface, chosen at runtime from the flags
//
// 3. Why does `with_context` appear only on some `?`s?
//    - It adds a human-readable line on top of the library error where the
//      library cannot know the context (which file we were reading)
// -----------------------------------------------------------------------------
