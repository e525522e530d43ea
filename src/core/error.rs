//! Error types for harvesting operations.

use std::time::Duration;

use thiserror::Error;

use super::worker_pool::PoolError;

/// Errors produced by harvest components.
///
/// Per-item variants (`RemoteCallFailed`, `DeadlineExceeded`, `WorkerPanic`)
/// never escape a worker loop; they are recorded as item failures. The rest
/// terminate the coordinator.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// The remote metadata API returned an error or a malformed payload.
    #[error("remote call failed: {0}")]
    RemoteCallFailed(String),
    /// A guarded call did not finish within its wall-clock budget.
    #[error("deadline of {budget:?} exceeded")]
    DeadlineExceeded {
        /// Budget that elapsed.
        budget: Duration,
    },
    /// Credentials were rejected until the retry budget ran out.
    #[error("authentication failed after {attempts} attempts")]
    AuthenticationFailed {
        /// Number of attempts made.
        attempts: u32,
    },
    /// Malformed interval-partition request.
    #[error("invalid range: {0}")]
    InvalidRange(String),
    /// Nothing was attempted, so nothing could be aggregated.
    #[error("no records produced and no items attempted")]
    EmptyResult,
    /// Worker pool failure.
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Table or checkpoint persistence failed.
    #[error("storage error: {0}")]
    Storage(String),
    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The processing function panicked.
    #[error("worker panicked: {0}")]
    WorkerPanic(String),
}

impl From<reqwest::Error> for HarvestError {
    fn from(err: reqwest::Error) -> Self {
        Self::RemoteCallFailed(err.to_string())
    }
}

impl From<csv::Error> for HarvestError {
    fn from(err: csv::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for HarvestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
