// src/store/mod.rs
// =============================================================================
// This module holds the history of every check.
//
// Submodules:
// - records: the in-memory collections and everything computed from them
//            (caps, recency, date ranges, statistics, pruning)
// - json:    a file-backed store that keeps two JSON files in a data dir
//
// Callers never talk to a concrete store directly. The checker and the
// retention sweeper take any `ObservationStore`, which keeps them testable
// with in-process doubles.
// =============================================================================

mod json;
mod records;

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::model::{BatchRecord, Observation, Statistics};

pub use json::JsonStore;
pub use records::PruneReport;

// The operations every observation store supports
//
// Mutations must be serialized by the implementation: two appends that land
// at the same instant must both survive, and a prune must never interleave
// with an append.
pub trait ObservationStore: Send + Sync {
    /// Adds one observation, evicting the oldest ones above the cap
    fn append_observation(
        &self,
        observation: Observation,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Adds one batch record, evicting the oldest ones above the batch cap
    fn append_batch(
        &self,
        record: BatchRecord,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Up to `limit` observations, newest first
    fn recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Observation>, StorageError>> + Send;

    /// Observations with `start <= timestamp <= end`, in store order
    fn by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Observation>, StorageError>> + Send;

    fn statistics(&self) -> impl Future<Output = Result<Statistics, StorageError>> + Send;

    /// Removes every observation and batch record strictly older than `older_than`
    fn prune(
        &self,
        older_than: DateTime<Utc>,
    ) -> impl Future<Output = Result<PruneReport, StorageError>> + Send;
}
