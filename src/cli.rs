// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Every subcommand maps onto one LinkMonitor operation:
//   check   -> check a single URL
//   batch   -> check several URLs at once
//   stats   -> aggregate statistics over the stored history
//   recent  -> the most recent checks
//   range   -> checks within a date range
//   sweep   -> run the retention sweeper
// =============================================================================

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};

use crate::config::{
    DEFAULT_DATA_DIR, DEFAULT_RECENT_LIMIT, DEFAULT_SWEEP_INTERVAL_HOURS, MAX_SWEEP_INTERVAL_HOURS,
};

#[derive(Parser, Debug)]
#[command(
    name = "link-watch",
    version,
    about = "Check whether URLs are reachable and keep a history of every check",
    long_about = "link-watch checks URLs with a single GET request, classifies each as working \
                  or broken, and records every check so you can see how reachability trends \
                  over time."
)]
pub struct Cli {
    /// Directory holding single-checks.json and bulk-checks.json
    #[arg(long, global = true, env = "LINK_WATCH_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Free-form label stored with each check as its request origin
    #[arg(long, global = true)]
    pub origin: Option<String>,

    /// Show debug logs (RUST_LOG still works for finer control)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a single URL
    ///
    /// Example: link-watch check https://example.com
    Check {
        url: String,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Check up to 10 URLs concurrently
    ///
    /// Example: link-watch batch https://example.com https://example.com/missing
    Batch {
        #[arg(required = true)]
        urls: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Show statistics over every stored check
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Show the most recent checks, newest first
    Recent {
        /// How many checks to show (1-1000)
        #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Show checks within a date range (inclusive)
    ///
    /// Dates are RFC 3339 timestamps or plain YYYY-MM-DD days.
    /// Example: link-watch range --start 2024-01-01 --end 2024-01-31
    Range {
        #[arg(long, value_parser = parse_range_start)]
        start: DateTime<Utc>,

        /// A plain date here means the end of that day
        #[arg(long, value_parser = parse_range_end)]
        end: DateTime<Utc>,

        #[arg(long)]
        json: bool,
    },

    /// Delete checks older than 30 days, then keep doing so on a schedule
    ///
    /// Runs until interrupted with Ctrl-C.
    Sweep {
        /// Hours between sweeps (1 to 8760)
        #[arg(
            long,
            env = "LINK_WATCH_SWEEP_HOURS",
            default_value_t = DEFAULT_SWEEP_INTERVAL_HOURS,
            value_parser = clap::value_parser!(u64).range(1..=MAX_SWEEP_INTERVAL_HOURS)
        )]
        interval_hours: u64,

        /// Sweep once and exit instead of running on a schedule
        #[arg(long)]
        once: bool,
    },
}

fn parse_range_start(value: &str) -> Result<DateTime<Utc>, String> {
    parse_date(value, NaiveTime::MIN)
}

fn parse_range_end(value: &str) -> Result<DateTime<Utc>, String> {
    let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    parse_date(value, end_of_day)
}

// Accepts either a full RFC 3339 timestamp or a YYYY-MM-DD date, which is
// pinned to `time_of_day` in UTC
fn parse_date(value: &str, time_of_day: NaiveTime) -> Result<DateTime<Utc>, String> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| Utc.from_utc_datetime(&date.and_time(time_of_day)))
        .map_err(|_| format!("'{}' is not a YYYY-MM-DD date or RFC 3339 timestamp", value))
}
