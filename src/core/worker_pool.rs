//! Worker pool engine: N OS-thread workers, a bounded input queue, a bounded
//! output queue, and a sentinel-based shutdown protocol.
//!
//! # Protocol
//!
//! 1. [`WorkerPool::start`] spawns the workers. Each blocks on the input queue.
//! 2. [`WorkerPool::submit`] enqueues items. It blocks while the input queue is
//!    full.
//! 3. [`WorkerPool::close_workers`] enqueues exactly one sentinel per worker.
//!    Items submitted earlier are ahead of every sentinel.
//! 4. [`WorkerPool::drain_results`] consumes the output queue until every
//!    worker has reported that it consumed its sentinel. Every processed item
//!    is acknowledged on the same queue, so the returned outcome accounts for
//!    each submitted item.
//! 5. [`WorkerPool::shutdown`] joins the (already exited) worker threads.
//!
//! Draining must run while workers are still producing: a worker blocked on a
//! full output queue never reaches its sentinel. [`WorkerPool::run`] does the
//! feeding on a scoped thread and the draining on the caller.
//!
//! Items still queued when the pool is dropped without being closed are never
//! processed.

// Platform-specific implementations
#[cfg(not(target_arch = "wasm32"))]
mod native;

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use super::error::HarvestError;

/// Errors that can occur when using a `WorkerPool`.
#[derive(Debug)]
pub enum PoolError {
    /// The input queue is full; `try_submit` did not enqueue the item.
    QueueFull,

    /// The pool no longer accepts work (sentinels already sent or pool shut down).
    PoolShutdown,

    /// Configuration validation failed.
    InvalidConfig(String),

    /// Internal error (thread spawn failure, feeder panic, channel closed).
    Internal(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "input queue is full"),
            Self::PoolShutdown => write!(f, "pool is closed to new work"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for PoolError {}

/// Statistics about pool progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of worker threads.
    pub worker_count: usize,

    /// Items currently being processed.
    pub active_items: u64,

    /// Items submitted.
    pub submitted_items: u64,

    /// Items processed without error (with or without records).
    pub completed_items: u64,

    /// Items dropped because of an error, timeout, or panic.
    pub failed_items: u64,

    /// Subset of `failed_items` that hit the deadline.
    pub timed_out_items: u64,

    /// Items skipped because the pool was dropped before they were reached.
    pub abandoned_items: u64,

    /// Records produced.
    pub records: u64,

    /// Sentinels placed on the input queue.
    pub sentinels_sent: usize,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub active_items: AtomicU64,
    pub submitted_items: AtomicU64,
    pub completed_items: AtomicU64,
    pub failed_items: AtomicU64,
    pub timed_out_items: AtomicU64,
    pub abandoned_items: AtomicU64,
    pub records: AtomicU64,
    pub sentinels_sent: AtomicUsize,
}

impl PoolCounters {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self, worker_count: usize) -> PoolStats {
        PoolStats {
            worker_count,
            active_items: self.active_items.load(Ordering::Relaxed),
            submitted_items: self.submitted_items.load(Ordering::Relaxed),
            completed_items: self.completed_items.load(Ordering::Relaxed),
            failed_items: self.failed_items.load(Ordering::Relaxed),
            timed_out_items: self.timed_out_items.load(Ordering::Relaxed),
            abandoned_items: self.abandoned_items.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
            sentinels_sent: self.sentinels_sent.load(Ordering::Relaxed),
        }
    }
}

/// What travels on the input queue.
#[derive(Debug)]
pub(crate) enum Message<P> {
    /// A work item with its submission sequence number.
    Item { seq: u64, item: P },
    /// No more work for the worker that receives this.
    Sentinel,
}

/// What travels on the output queue.
#[derive(Debug)]
pub(crate) enum WorkerEvent<R> {
    /// An item finished; `records` may be empty.
    Completed { seq: u64, records: Vec<R> },
    /// An item was dropped.
    Failed(ItemFailure),
    /// A worker consumed its sentinel and will send nothing more.
    Exited { worker_id: usize },
}

/// Why an item was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The remote call (or any other processing step) returned an error.
    Remote,
    /// The deadline elapsed.
    Deadline,
    /// The processing function panicked.
    Panic,
}

impl From<&HarvestError> for FailureKind {
    fn from(err: &HarvestError) -> Self {
        match err {
            HarvestError::DeadlineExceeded { .. } => Self::Deadline,
            HarvestError::WorkerPanic(_) => Self::Panic,
            _ => Self::Remote,
        }
    }
}

/// One dropped item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Submission sequence number.
    pub seq: u64,
    /// Worker that ran the item.
    pub worker_id: usize,
    /// Debug rendering of the item.
    pub item: String,
    /// Failure category.
    pub kind: FailureKind,
    /// Error message.
    pub message: String,
}

impl ItemFailure {
    pub(crate) fn new(seq: u64, worker_id: usize, item: String, error: &HarvestError) -> Self {
        Self {
            seq,
            worker_id,
            item,
            kind: FailureKind::from(error),
            message: error.to_string(),
        }
    }
}

/// Everything drained from a pool run.
///
/// Record order is not meaningful; it depends on worker scheduling.
#[derive(Debug)]
pub struct HarvestOutcome<R> {
    /// Records from every successful item.
    pub records: Vec<R>,
    /// Every dropped item.
    pub failures: Vec<ItemFailure>,
    /// Items that finished without error.
    pub completed: u64,
    /// Items submitted before the drain finished.
    pub submitted: u64,
}

impl<R> Default for HarvestOutcome<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            failures: Vec::new(),
            completed: 0,
            submitted: 0,
        }
    }
}

impl<R> HarvestOutcome<R> {
    /// Items acknowledged by a worker, whether they succeeded or not.
    #[must_use]
    pub fn acknowledged(&self) -> u64 {
        self.completed + self.failures.len() as u64
    }

    /// True when every submitted item was acknowledged.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.acknowledged() == self.submitted
    }

    /// Number of items dropped at the deadline.
    #[must_use]
    pub fn timed_out(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.kind == FailureKind::Deadline)
            .count()
    }
}

// Re-export the platform-specific WorkerPool implementation
#[cfg(not(target_arch = "wasm32"))]
pub use native::WorkerPool;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_pool_error_display() {
        assert_eq!(format!("{}", PoolError::QueueFull), "input queue is full");
        assert_eq!(format!("{}", PoolError::PoolShutdown), "pool is closed to new work");
        assert_eq!(
            format!("{}", PoolError::InvalidConfig("worker_count".into())),
            "invalid configuration: worker_count"
        );
    }

    #[test]
    fn test_pool_counters_snapshot() {
        let counters = PoolCounters::default();
        counters.submitted_items.fetch_add(10, Ordering::Relaxed);
        counters.completed_items.fetch_add(7, Ordering::Relaxed);
        counters.failed_items.fetch_add(2, Ordering::Relaxed);
        counters.sentinels_sent.fetch_add(4, Ordering::Relaxed);

        let stats = counters.snapshot(4);
        assert_eq!(stats.worker_count, 4);
        assert_eq!(stats.submitted_items, 10);
        assert_eq!(stats.completed_items, 7);
        assert_eq!(stats.failed_items, 2);
        assert_eq!(stats.sentinels_sent, 4);
    }

    #[test]
    fn test_failure_kind_from_error() {
        let timeout = HarvestError::DeadlineExceeded { budget: Duration::from_secs(10) };
        assert_eq!(FailureKind::from(&timeout), FailureKind::Deadline);
        assert_eq!(
            FailureKind::from(&HarvestError::WorkerPanic("x".into())),
            FailureKind::Panic
        );
        assert_eq!(
            FailureKind::from(&HarvestError::RemoteCallFailed("404".into())),
            FailureKind::Remote
        );
    }

    #[test]
    fn test_outcome_accounting() {
        let mut outcome = HarvestOutcome::<u32> {
            records: vec![1, 2],
            completed: 2,
            submitted: 3,
            ..HarvestOutcome::default()
        };
        assert!(!outcome.is_complete());

        outcome.failures.push(ItemFailure::new(
            2,
            0,
            "\"r2\"".into(),
            &HarvestError::DeadlineExceeded { budget: Duration::from_secs(1) },
        ));
        assert!(outcome.is_complete());
        assert_eq!(outcome.timed_out(), 1);
    }
}
