// src/config.rs
// =============================================================================
// Fixed limits and runtime settings.
//
// Almost everything here is a constant on purpose: the request timeout, the
// redirect limit and the retention caps are not caller-tunable. The only
// values a user can change are where the data lives and how often the
// retention sweeper wakes up; those come from the command line (or the
// environment) and are collected into `Settings`.
// =============================================================================

use std::time::Duration;

/// Timeout for one outbound check, redirects included
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Redirects followed before a check is classified as broken
pub const MAX_REDIRECTS: usize = 5;

/// Largest batch accepted by `LinkMonitor::check_batch`
pub const MAX_URLS_PER_REQUEST: usize = 10;

/// Checks in flight at once inside a single batch
pub const MAX_CONCURRENT_CHECKS: usize = 50;

// Retention caps. Oldest records are evicted first once these are exceeded.
pub const MAX_OBSERVATIONS: usize = 10_000;
pub const MAX_BATCH_RECORDS: usize = 1_000;

pub const DEFAULT_RECENT_LIMIT: usize = 50;
pub const MAX_RECENT_LIMIT: usize = 1_000;

/// Observations older than this are removed by the sweeper
pub const RETENTION_DAYS: i64 = 30;

pub const DEFAULT_SWEEP_INTERVAL_HOURS: u64 = 24;
/// One year. Longer intervals are rejected on the command line.
pub const MAX_SWEEP_INTERVAL_HOURS: u64 = 24 * 365;

pub const DEFAULT_DATA_DIR: &str = "data";

// File names inside the data directory
pub const SINGLE_CHECKS_FILE: &str = "single-checks.json";
pub const BULK_CHECKS_FILE: &str = "bulk-checks.json";
pub const LOCK_FILE: &str = ".link-watch.lock";

pub const INVALID_URL_FORMAT: &str = "Invalid URL format";
pub const FAILED_REQUEST: &str = "Failed to check URL";

/// User agent sent with every check and recorded in request metadata
pub fn user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

// Sweeper settings, resolved from CLI flags and env vars.
// The data directory is passed straight to the store.
#[derive(Debug, Clone)]
pub struct Settings {
    pub sweep_interval: Duration,
    pub retention: chrono::Duration,
}

impl Settings {
    // Hours are clamped to 1..=MAX_SWEEP_INTERVAL_HOURS
    pub fn new(sweep_interval_hours: u64) -> Self {
        let hours = sweep_interval_hours.clamp(1, MAX_SWEEP_INTERVAL_HOURS);
        Settings {
            sweep_interval: Duration::from_secs(hours * 60 * 60),
            retention: chrono::Duration::days(RETENTION_DAYS),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::new(DEFAULT_SWEEP_INTERVAL_HOURS)
    }
}
