// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Four subcommands:
// - check: synchronous run, prints the report
// - start: begins a resumable run (seed + queue), state kept in a directory
// - tick:  processes one queued URL of a resumable run
// - drain: ticks a resumable run until it completes
//
// `start`/`tick` are what a cron job or web hook would call. `drain` is the
// same loop done locally.
// =============================================================================

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "site-monitor",
    version = "0.1.0",
    about = "Crawl a website, report broken and slow pages, diff links against a baseline",
    long_about = "site-monitor walks every page of one site, logs pages that fail to load or load \
                  slowly, and compares the discovered links with a base links file written by the first run."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl the whole site now and print the report
    ///
    /// Example: site-monitor check --settings monitor.json
    Check {
        /// Path to the JSON settings file
        #[arg(long, default_value = "monitor.json")]
        settings: PathBuf,

        /// Print the report as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Also write the HTML report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Start a resumable run; prints the run's data key
    ///
    /// Example: site-monitor start --settings monitor.json --state-dir .monitor
    Start {
        #[arg(long, default_value = "monitor.json")]
        settings: PathBuf,

        /// Directory holding crawl state and queue files
        #[arg(long, default_value = ".site-monitor")]
        state_dir: PathBuf,

        /// Treat the request as coming from this IP (checked against allowed_ip)
        #[arg(long)]
        caller_ip: Option<String>,

        /// Mark the request as the scheduler's own dispatch (skips the IP check)
        #[arg(long)]
        internal: bool,
    },

    /// Process one queued URL of a resumable run
    Tick {
        #[arg(long)]
        log_id: String,

        #[arg(long, default_value = ".site-monitor")]
        state_dir: PathBuf,
    },

    /// Tick a resumable run until it completes and print the report
    Drain {
        #[arg(long)]
        log_id: String,

        #[arg(long, default_value = ".site-monitor")]
        state_dir: PathBuf,

        /// Also write the HTML report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why PathBuf instead of String for paths?
//    - PathBuf is the owned path type; it handles platform separators and
//      non-UTF-8 file names, and clap parses it directly
//
// 2. What does Option<...> on an argument mean?
//    - The flag is optional; clap fills in None when it is absent
//
// 3. default_value vs default_value_t?
//    - default_value takes the string form and parses it like user input
//    - default_value_t takes an already typed value
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check() {
        let cli = Cli::parse_from(["site-monitor", "check", "--settings", "m.json", "--json"]);
        match cli.command {
            Commands::Check { settings, json, report } => {
                assert_eq!(settings, PathBuf::from("m.json"));
                assert!(json);
                assert!(report.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_start_with_caller() {
        let cli = Cli::parse_from(["site-monitor", "start", "--caller-ip", "10.0.0.1"]);
        match cli.command {
            Commands::Start { state_dir, caller_ip, internal, .. } => {
                assert_eq!(state_dir, PathBuf::from(".site-monitor"));
                assert_eq!(caller_ip.as_deref(), Some("10.0.0.1"));
                assert!(!internal);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_tick_requires_log_id() {
        assert!(Cli::try_parse_from(["site-monitor", "tick"]).is_err());
    }
}
