// src/error.rs
// =============================================================================
// Error types for the store and the monitor API.
//
// Two kinds of failure are kept apart:
// - StorageError: the data directory could not be read or written
// - MonitorError: what callers of LinkMonitor see (bad input, storage
//   failure, HTTP client setup failure)
//
// A broken URL is NOT an error. It comes back as a CheckOutcome with
// is_broken = true.
// =============================================================================

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// Reading, writing or renaming a store file failed
    #[error("Storage I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A store file exists but does not hold valid records
    #[error("Storage file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Records could not be serialized before writing
    #[error("Failed to encode records: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum MonitorError {
    /// Input rejected before any I/O happened
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("HTTP client initialization error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl MonitorError {
    pub fn is_validation(&self) -> bool {
        matches!(self, MonitorError::Validation(_))
    }
}
