// src/model.rs
// =============================================================================
// Data types shared by the checker, the store and the CLI.
//
// - CheckOutcome: what one check returns to the caller
// - Observation:  a CheckOutcome as persisted (id, timestamp, metadata)
// - BatchRecord:  one persisted multi-URL check
// - Statistics:   aggregate numbers computed from the stored observations
//
// Field names are camelCase on the wire and on disk, so the JSON files stay
// readable by anything that already consumes them.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::INVALID_URL_FORMAT;

// The result of checking one URL
//
// Exactly one of these holds:
// - working: is_broken = false, status_code is set
// - broken:  is_broken = true, error is set (status_code only if a response came back)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutcome {
    pub url: String,
    pub is_broken: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Absent only when the URL was rejected before any request was sent
    #[serde(
        rename = "responseTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub response_time_ms: Option<u64>,
}

impl CheckOutcome {
    pub fn working(url: impl Into<String>, status_code: u16, response_time_ms: u64) -> Self {
        CheckOutcome {
            url: url.into(),
            is_broken: false,
            status_code: Some(status_code),
            error: None,
            response_time_ms: Some(response_time_ms),
        }
    }

    pub fn broken(
        url: impl Into<String>,
        status_code: Option<u16>,
        error: impl Into<String>,
        response_time_ms: u64,
    ) -> Self {
        CheckOutcome {
            url: url.into(),
            is_broken: true,
            status_code,
            error: Some(error.into()),
            response_time_ms: Some(response_time_ms),
        }
    }

    /// Outcome for input that never reached the network
    pub fn invalid(url: impl Into<String>) -> Self {
        CheckOutcome {
            url: url.into(),
            is_broken: true,
            status_code: None,
            error: Some(INVALID_URL_FORMAT.to_string()),
            response_time_ms: None,
        }
    }
}

// Who asked for the check. Stored as-is, never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

// One persisted check. Never mutated after it is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    #[serde(flatten)]
    pub outcome: CheckOutcome,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RequestMetadata>,
}

impl Observation {
    /// Stamps an outcome with a fresh id and the current time
    pub fn record(outcome: CheckOutcome, metadata: Option<RequestMetadata>) -> Self {
        Observation::at(outcome, Utc::now(), metadata)
    }

    pub fn at(
        outcome: CheckOutcome,
        timestamp: DateTime<Utc>,
        metadata: Option<RequestMetadata>,
    ) -> Self {
        Observation {
            id: Uuid::new_v4().to_string(),
            outcome,
            timestamp,
            metadata,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub broken: usize,
    pub working: usize,
}

impl BatchSummary {
    pub fn tally(outcomes: &[CheckOutcome]) -> Self {
        let broken = outcomes.iter().filter(|o| o.is_broken).count();
        BatchSummary {
            total: outcomes.len(),
            broken,
            working: outcomes.len() - broken,
        }
    }
}

// One persisted batch invocation
//
// `results` has the same length and order as `urls`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub id: String,
    pub urls: Vec<String>,
    pub results: Vec<Observation>,
    pub summary: BatchSummary,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RequestMetadata>,
}

impl BatchRecord {
    // Each result gets its own id and timestamp here. These are the storage
    // copies of outcomes already appended as observations by the checks.
    pub fn new(
        urls: Vec<String>,
        outcomes: &[CheckOutcome],
        metadata: Option<RequestMetadata>,
    ) -> Self {
        let results = outcomes
            .iter()
            .map(|outcome| Observation::record(outcome.clone(), metadata.clone()))
            .collect();

        BatchRecord {
            id: Uuid::new_v4().to_string(),
            urls,
            results,
            summary: BatchSummary::tally(outcomes),
            timestamp: Utc::now(),
            metadata,
        }
    }
}

/// What `LinkMonitor::check_batch` hands back
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub results: Vec<CheckOutcome>,
    pub summary: BatchSummary,
}

// Aggregates over the stored observations. Computed on demand, never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    /// Single checks plus batch invocations
    pub total_checks: usize,
    pub total_urls: usize,
    pub broken_urls: usize,
    pub working_urls: usize,
    /// Mean over observations that have a response time, rounded to whole ms
    pub average_response_time: u64,
    pub last_check: Option<DateTime<Utc>>,
    pub checks_today: usize,
    pub checks_this_week: usize,
    pub checks_this_month: usize,
}
