// src/store/records.rs
// =============================================================================
// The in-memory side of the store.
//
// `Records` is plain data plus pure functions: no I/O, no locking. The JSON
// store wraps it with a mutex and the files on disk. Keeping the logic here
// means caps, queries and statistics can be tested without a filesystem.
// =============================================================================

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::config::{MAX_BATCH_RECORDS, MAX_OBSERVATIONS};
use crate::model::{BatchRecord, Observation, Statistics};

// Anything stored with a completion time
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Timestamped for Observation {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for BatchRecord {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

// How much a prune removed and kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneReport {
    pub observations_removed: usize,
    pub observations_kept: usize,
    pub batches_removed: usize,
    pub batches_kept: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Records {
    pub observations: Vec<Observation>,
    pub batches: Vec<BatchRecord>,
}

impl Records {
    pub fn new(observations: Vec<Observation>, batches: Vec<BatchRecord>) -> Self {
        let mut records = Records {
            observations,
            batches,
        };
        // Files written by older versions may hold more than the caps allow
        evict_oldest(&mut records.observations, MAX_OBSERVATIONS);
        evict_oldest(&mut records.batches, MAX_BATCH_RECORDS);
        records
    }

    pub fn recent(&self, limit: usize) -> Vec<Observation> {
        let mut newest: Vec<&Observation> = self.observations.iter().collect();
        // Stable sort: equal timestamps keep store order
        newest.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        newest.into_iter().take(limit).cloned().collect()
    }

    pub fn by_date_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Observation> {
        self.observations
            .iter()
            .filter(|obs| obs.timestamp >= start && obs.timestamp <= end)
            .cloned()
            .collect()
    }

    // Statistics as seen at `now`
    //
    // Windows are in UTC:
    //   today      = since 00:00 today
    //   this week  = the trailing 7 x 24 hours
    //   this month = since 00:00 on the 1st
    pub fn statistics_at(&self, now: DateTime<Utc>) -> Statistics {
        let today = start_of_day(now.date_naive());
        let this_week = now - Duration::days(7);
        let this_month = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
            .map(start_of_day)
            .unwrap_or(today);

        let total_urls = self.observations.len();
        let broken_urls = self.observations.iter().filter(|o| o.outcome.is_broken).count();

        let since = |cutoff: DateTime<Utc>| {
            self.observations
                .iter()
                .filter(|o| o.timestamp >= cutoff)
                .count()
        };

        let (sum, timed) = self
            .observations
            .iter()
            .filter_map(|o| o.outcome.response_time_ms)
            .fold((0u64, 0u64), |(sum, n), ms| (sum + ms, n + 1));
        let average_response_time = if timed > 0 {
            (sum as f64 / timed as f64).round() as u64
        } else {
            0
        };

        Statistics {
            total_checks: self.batches.len() + total_urls,
            total_urls,
            broken_urls,
            working_urls: total_urls - broken_urls,
            average_response_time,
            last_check: self.observations.iter().map(|o| o.timestamp).max(),
            checks_today: since(today),
            checks_this_week: since(this_week),
            checks_this_month: since(this_month),
        }
    }

    /// Keeps only records with `timestamp >= older_than`
    pub fn prune(&mut self, older_than: DateTime<Utc>) -> PruneReport {
        let observations_before = self.observations.len();
        let batches_before = self.batches.len();

        self.observations.retain(|o| o.timestamp >= older_than);
        self.batches.retain(|b| b.timestamp >= older_than);

        PruneReport {
            observations_removed: observations_before - self.observations.len(),
            observations_kept: self.observations.len(),
            batches_removed: batches_before - self.batches.len(),
            batches_kept: self.batches.len(),
        }
    }
}

pub fn append_capped<T: Timestamped>(items: &mut Vec<T>, item: T, cap: usize) {
    items.push(item);
    evict_oldest(items, cap);
}

// Drops the oldest entries until at most `cap` remain, keeping the
// survivors in store order. Ties go to whichever was stored first.
pub fn evict_oldest<T: Timestamped>(items: &mut Vec<T>, cap: usize) {
    let excess = items.len().saturating_sub(cap);
    if excess == 0 {
        return;
    }

    let mut by_age: Vec<(DateTime<Utc>, usize)> = items
        .iter()
        .enumerate()
        .map(|(index, item)| (item.timestamp(), index))
        .collect();
    by_age.sort_unstable();

    let mut evict = vec![false; items.len()];
    for &(_, index) in &by_age[..excess] {
        evict[index] = true;
    }

    let mut index = 0;
    items.retain(|_| {
        let keep = !evict[index];
        index += 1;
        keep
    });
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}
