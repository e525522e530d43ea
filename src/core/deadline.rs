//! Deadline guard: a hard wall-clock budget around one remote call.
//!
//! Two forms are provided:
//!
//! - [`run_with_deadline`] runs a future as its own task and aborts the task
//!   when the budget elapses. Used by pool workers, each of which owns a
//!   single-threaded runtime.
//! - [`run_blocking_with_deadline`] runs a blocking closure on a helper thread
//!   and stops waiting when the budget elapses. The closure keeps running to
//!   completion in the background; its result is discarded.
//!
//! Neither form touches process-wide state, so guards nest and run
//! concurrently on any number of workers.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};
use tracing::debug;

use super::error::HarvestError;

/// A reusable wall-clock budget for guarded calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineGuard {
    budget: Duration,
}

impl DeadlineGuard {
    /// Create a guard with the given budget.
    #[must_use]
    pub const fn new(budget: Duration) -> Self {
        Self { budget }
    }

    /// Create a guard from whole seconds.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// The configured budget.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// Run `fut` under this guard's budget. See [`run_with_deadline`].
    ///
    /// # Errors
    ///
    /// Same as [`run_with_deadline`].
    pub async fn run<F, T>(&self, fut: F) -> Result<T, HarvestError>
    where
        F: Future<Output = Result<T, HarvestError>> + Send + 'static,
        T: Send + 'static,
    {
        run_with_deadline(self.budget, fut).await
    }

    /// Run a blocking closure under this guard's budget. See [`run_blocking_with_deadline`].
    ///
    /// # Errors
    ///
    /// Same as [`run_blocking_with_deadline`].
    pub fn run_blocking<F, T>(&self, f: F) -> Result<T, HarvestError>
    where
        F: FnOnce() -> Result<T, HarvestError> + Send + 'static,
        T: Send + 'static,
    {
        run_blocking_with_deadline(self.budget, f)
    }
}

impl Default for DeadlineGuard {
    fn default() -> Self {
        Self::from_secs(10)
    }
}

/// Run `fut` as a separate task and wait at most `budget` for it.
///
/// Must be called from within a tokio runtime. On expiry the task is aborted
/// at its next await point and any result it would have produced is lost.
///
/// # Errors
///
/// - `HarvestError::DeadlineExceeded` if the budget elapses first
/// - `HarvestError::WorkerPanic` if the future panics
/// - any error returned by `fut` itself, unchanged
pub async fn run_with_deadline<F, T>(budget: Duration, fut: F) -> Result<T, HarvestError>
where
    F: Future<Output = Result<T, HarvestError>> + Send + 'static,
    T: Send + 'static,
{
    let mut handle = tokio::spawn(fut);

    match tokio::time::timeout(budget, &mut handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) if join_err.is_panic() => {
            Err(HarvestError::WorkerPanic(panic_message(join_err.into_panic().as_ref())))
        }
        Ok(Err(join_err)) => Err(HarvestError::WorkerPanic(join_err.to_string())),
        Err(_) => {
            handle.abort();
            debug!(budget_ms = budget.as_millis(), "Guarded call abandoned at deadline");
            Err(HarvestError::DeadlineExceeded { budget })
        }
    }
}

/// Run a blocking closure on a helper thread and wait at most `budget` for it.
///
/// The helper thread is never interrupted. If the budget elapses the caller
/// gets `DeadlineExceeded` immediately and the thread finishes on its own.
///
/// # Errors
///
/// - `HarvestError::DeadlineExceeded` if the budget elapses first
/// - `HarvestError::WorkerPanic` if the closure panics
/// - `HarvestError::Io` if the helper thread cannot be spawned
/// - any error returned by `f` itself, unchanged
pub fn run_blocking_with_deadline<F, T>(budget: Duration, f: F) -> Result<T, HarvestError>
where
    F: FnOnce() -> Result<T, HarvestError> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = bounded(1);

    thread::Builder::new()
        .name("deadline-call".into())
        .spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(f));
            // Receiver is gone once the deadline has passed.
            let _ = tx.send(outcome);
        })?;

    match rx.recv_timeout(budget) {
        Ok(Ok(result)) => result,
        Ok(Err(payload)) => Err(HarvestError::WorkerPanic(panic_message(payload.as_ref()))),
        Err(RecvTimeoutError::Timeout) => {
            debug!(budget_ms = budget.as_millis(), "Blocking call abandoned at deadline");
            Err(HarvestError::DeadlineExceeded { budget })
        }
        Err(RecvTimeoutError::Disconnected) => Err(HarvestError::WorkerPanic(
            "guarded call exited without a result".into(),
        )),
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
