//! Native implementation of `WorkerPool` using OS threads.
//!
//! Each worker thread owns a single-threaded tokio runtime used only to drive
//! the deadline guard around one item at a time.
//!
//! # Design Principles
//!
//! - **No polling**: workers block on channel recv; the drain blocks on the
//!   output channel and counts worker exits
//! - **Explicit acknowledgment**: one output event per processed item
//! - **Clean shutdown**: one sentinel per worker; dropping the input sender
//!   also unblocks idle workers

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::WorkerPoolConfig;
use crate::core::deadline::DeadlineGuard;
use crate::core::error::HarvestError;
use crate::core::executor::ItemProcessor;
use crate::core::progress::{ProgressSink, SilentProgress};

use super::{HarvestOutcome, ItemFailure, Message, PoolCounters, PoolError, PoolStats, WorkerEvent};

/// Worker pool with dedicated OS threads and bounded input/output queues.
///
/// `P` is the work item type, `R` the record type produced per item.
pub struct WorkerPool<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Pool configuration.
    config: WorkerPoolConfig,

    /// Input sender. Read-locked by `submit`, write-locked by `close_workers`
    /// so that no item can land behind a sentinel.
    input_tx: RwLock<Option<Sender<Message<P>>>>,

    /// Output receiver. Workers hold the only senders.
    output_rx: Receiver<WorkerEvent<R>>,

    /// Pool statistics counters (lock-free atomics).
    counters: Arc<PoolCounters>,

    /// Set once sentinels have been sent.
    closed: AtomicBool,

    /// Set once `drain_results` has seen every worker exit.
    drained: AtomicBool,

    /// Tells workers to skip remaining items.
    abandon: Arc<AtomicBool>,

    /// Worker thread handles.
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<P, R> WorkerPool<P, R>
where
    P: Send + fmt::Debug + 'static,
    R: Send + 'static,
{
    /// Start a pool with silent progress.
    ///
    /// # Errors
    ///
    /// See [`WorkerPool::start_with_progress`].
    pub fn start<E>(config: WorkerPoolConfig, processor: E) -> Result<Self, PoolError>
    where
        E: ItemProcessor<P, R>,
    {
        Self::start_with_progress(config, processor, Arc::new(SilentProgress::new()))
    }

    /// Start `config.worker_count` workers, each running `processor` on the
    /// items it dequeues.
    ///
    /// # Errors
    ///
    /// - `PoolError::InvalidConfig` if the configuration is invalid
    /// - `PoolError::Internal` if a worker thread cannot be spawned
    pub fn start_with_progress<E>(
        config: WorkerPoolConfig,
        processor: E,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<Self, PoolError>
    where
        E: ItemProcessor<P, R>,
    {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let (input_tx, input_rx) = bounded::<Message<P>>(config.input_capacity);
        let (output_tx, output_rx) = bounded::<WorkerEvent<R>>(config.output_capacity);
        let counters = Arc::new(PoolCounters::default());
        let abandon = Arc::new(AtomicBool::new(false));
        let processor = Arc::new(processor);
        let guard = DeadlineGuard::new(config.deadline);

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            let worker = Worker {
                worker_id,
                inbox: input_rx.clone(),
                events: output_tx.clone(),
                counters: Arc::clone(&counters),
                abandon: Arc::clone(&abandon),
                processor: Arc::clone(&processor),
                guard,
                progress: Arc::clone(&progress),
            };
            let handle = thread::Builder::new()
                .name(format!("harvest-worker-{worker_id}"))
                .stack_size(config.thread_stack_size)
                .spawn(move || worker.run());

            match handle {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Already-spawned workers exit once the input sender drops.
                    abandon.store(true, Ordering::Release);
                    return Err(PoolError::Internal(format!(
                        "failed to spawn worker {worker_id}: {e}"
                    )));
                }
            }
        }

        info!(
            worker_count = config.worker_count,
            input_capacity = config.input_capacity,
            output_capacity = config.output_capacity,
            deadline_ms = config.deadline.as_millis(),
            "WorkerPool started"
        );

        Ok(Self {
            config,
            input_tx: RwLock::new(Some(input_tx)),
            output_rx,
            counters,
            closed: AtomicBool::new(false),
            drained: AtomicBool::new(false),
            abandon,
            workers: Mutex::new(workers),
        })
    }

    /// Enqueue one item, blocking while the input queue is full.
    ///
    /// # Errors
    ///
    /// `PoolError::PoolShutdown` once `close_workers` has been called.
    pub fn submit(&self, item: P) -> Result<(), PoolError> {
        let input = self.input_tx.read();
        let Some(tx) = input.as_ref() else {
            return Err(PoolError::PoolShutdown);
        };

        let seq = self.counters.submitted_items.fetch_add(1, Ordering::Relaxed);
        if tx.send(Message::Item { seq, item }).is_err() {
            self.counters.submitted_items.fetch_sub(1, Ordering::Relaxed);
            return Err(PoolError::PoolShutdown);
        }
        debug!(seq = seq, "Item submitted to worker pool");
        Ok(())
    }

    /// Enqueue one item without blocking.
    ///
    /// # Errors
    ///
    /// - `PoolError::QueueFull` if the input queue is full
    /// - `PoolError::PoolShutdown` once `close_workers` has been called
    pub fn try_submit(&self, item: P) -> Result<(), PoolError> {
        let input = self.input_tx.read();
        let Some(tx) = input.as_ref() else {
            return Err(PoolError::PoolShutdown);
        };

        let seq = self.counters.submitted_items.fetch_add(1, Ordering::Relaxed);
        match tx.try_send(Message::Item { seq, item }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.counters.submitted_items.fetch_sub(1, Ordering::Relaxed);
                warn!("Worker pool input queue is full");
                Err(PoolError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.counters.submitted_items.fetch_sub(1, Ordering::Relaxed);
                Err(PoolError::PoolShutdown)
            }
        }
    }

    /// Enqueue exactly one sentinel per worker and stop accepting items.
    ///
    /// Blocks while the input queue is full. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// `PoolError::Internal` if every worker has already gone away.
    pub fn close_workers(&self) -> Result<(), PoolError> {
        let mut input = self.input_tx.write();
        let Some(tx) = input.take() else {
            return Ok(());
        };

        for _ in 0..self.config.worker_count {
            tx.send(Message::Sentinel)
                .map_err(|_| PoolError::Internal("all workers exited before close".into()))?;
            self.counters.sentinels_sent.fetch_add(1, Ordering::Relaxed);
        }
        self.closed.store(true, Ordering::Release);
        debug!(sentinels = self.config.worker_count, "Sentinels enqueued");
        Ok(())
    }

    /// Collect every record and failure until all workers have consumed their
    /// sentinels.
    ///
    /// Blocks until `close_workers` has been called (possibly from another
    /// thread) and every worker has finished its last item. Workers write to a
    /// bounded output queue, so this must run concurrently with them rather
    /// than after they finish.
    pub fn drain_results(&self) -> HarvestOutcome<R> {
        let mut outcome = HarvestOutcome::default();
        let mut exited = 0;

        while exited < self.config.worker_count {
            match self.output_rx.recv() {
                Ok(WorkerEvent::Completed { seq, records }) => {
                    debug!(seq = seq, records = records.len(), "Item acknowledged");
                    outcome.completed += 1;
                    outcome.records.extend(records);
                }
                Ok(WorkerEvent::Failed(failure)) => outcome.failures.push(failure),
                Ok(WorkerEvent::Exited { worker_id }) => {
                    debug!(worker_id = worker_id, "Worker exit acknowledged");
                    exited += 1;
                }
                Err(_) => {
                    // Every sender is gone: remaining workers died without an exit event.
                    warn!(
                        exited = exited,
                        worker_count = self.config.worker_count,
                        "Output queue disconnected before all workers reported exit"
                    );
                    break;
                }
            }
        }

        outcome.submitted = self.counters.submitted_items.load(Ordering::Relaxed);
        if !outcome.is_complete() {
            warn!(
                submitted = outcome.submitted,
                acknowledged = outcome.acknowledged(),
                "Drain finished with unacknowledged items"
            );
        }
        self.drained.store(true, Ordering::Release);
        outcome
    }

    /// Feed `items` from a scoped thread, close the workers, drain on the
    /// calling thread, then shut the pool down.
    ///
    /// # Errors
    ///
    /// - `PoolError::PoolShutdown` if the pool was already closed
    /// - `PoolError::Internal` if the feeder thread panicked
    pub fn run<I>(self, items: I) -> Result<HarvestOutcome<R>, PoolError>
    where
        I: IntoIterator<Item = P>,
        I::IntoIter: Send,
    {
        let mut items = items.into_iter();
        let pool = &self;

        let outcome = thread::scope(|scope| {
            let feeder = scope.spawn(move || {
                let fed = items.try_for_each(|item| pool.submit(item));
                // Close even after a failed submit so the drain can finish.
                let closed = pool.close_workers();
                fed.and(closed)
            });

            let outcome = pool.drain_results();
            feeder
                .join()
                .map_err(|_| PoolError::Internal("feeder thread panicked".into()))?
                .map(|()| outcome)
        })?;

        self.shutdown();
        Ok(outcome)
    }

    /// Whether sentinels have been sent.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.config.worker_count)
    }

    /// Release worker threads.
    ///
    /// Joins each worker with a two-second timeout. If results were never
    /// drained, workers may be blocked on a full output queue, so they are
    /// told to skip remaining items and detached instead of joined.
    pub fn shutdown(self) {
        if !self.drained.load(Ordering::Acquire) {
            warn!("WorkerPool shut down before drain_results; detaching workers");
            self.abandon.store(true, Ordering::Release);
            return;
        }

        let mut workers = self.workers.lock();
        let worker_count = workers.len();

        for (idx, worker) in workers.drain(..).enumerate() {
            match join_with_timeout(worker, WORKER_JOIN_TIMEOUT) {
                JoinStatus::Joined => debug!(worker_id = idx, "Worker joined successfully"),
                JoinStatus::Panicked => warn!(worker_id = idx, "Worker panicked"),
                JoinStatus::Detached => {
                    warn!(worker_id = idx, "Worker did not exit within timeout - detaching");
                }
            }
        }

        info!(worker_count = worker_count, "Worker pool shut down complete");
    }
}

impl<P, R> Drop for WorkerPool<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    fn drop(&mut self) {
        // Dropping the sender unblocks idle workers; queued items are skipped.
        if self.input_tx.write().take().is_some() {
            self.abandon.store(true, Ordering::Release);
            debug!("WorkerPool dropped without close_workers - queued items abandoned");
        }
    }
}

const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinStatus {
    Joined,
    Panicked,
    Detached,
}

/// Join `worker` from a helper thread, giving up after `timeout`.
///
/// On timeout neither thread is waited for; the helper finishes the join in
/// the background whenever the worker exits.
fn join_with_timeout(worker: JoinHandle<()>, timeout: Duration) -> JoinStatus {
    let (tx, rx) = bounded(1);
    let helper = thread::spawn(move || {
        let _ = tx.send(worker.join().is_ok());
    });

    match rx.recv_timeout(timeout) {
        Ok(joined) => {
            let _ = helper.join();
            if joined {
                JoinStatus::Joined
            } else {
                JoinStatus::Panicked
            }
        }
        Err(_) => JoinStatus::Detached,
    }
}

/// State owned by one worker thread.
struct Worker<P, R, E> {
    worker_id: usize,
    inbox: Receiver<Message<P>>,
    events: Sender<WorkerEvent<R>>,
    counters: Arc<PoolCounters>,
    abandon: Arc<AtomicBool>,
    processor: Arc<E>,
    guard: DeadlineGuard,
    progress: Arc<dyn ProgressSink>,
}

impl<P, R, E> Worker<P, R, E>
where
    P: Send + fmt::Debug + 'static,
    R: Send + 'static,
    E: ItemProcessor<P, R>,
{
    fn run(self) {
        let worker_id = self.worker_id;
        debug!(worker_id = worker_id, "Worker thread started");

        let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                error!(worker_id = worker_id, error = %e, "Failed to create worker runtime");
                let _ = self.events.send(WorkerEvent::Exited { worker_id });
                return;
            }
        };

        loop {
            let (seq, item) = match self.inbox.recv() {
                Ok(Message::Item { seq, item }) => (seq, item),
                Ok(Message::Sentinel) => {
                    debug!(worker_id = worker_id, "Worker received sentinel");
                    break;
                }
                Err(_) => {
                    debug!(worker_id = worker_id, "Worker input closed, exiting");
                    break;
                }
            };

            if self.abandon.load(Ordering::Acquire) {
                self.counters.abandoned_items.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let event = self.process(&rt, seq, item);
            if self.events.send(event).is_err() {
                debug!(worker_id = worker_id, "Output receiver dropped, exiting");
                break;
            }
        }

        let _ = self.events.send(WorkerEvent::Exited { worker_id });
        // Abandoned blocking calls must not hold this thread hostage.
        rt.shutdown_background();
        debug!(worker_id = worker_id, "Worker thread exiting");
    }

    fn process(&self, rt: &tokio::runtime::Runtime, seq: u64, item: P) -> WorkerEvent<R> {
        self.counters.active_items.fetch_add(1, Ordering::Relaxed);
        let description = format!("{item:?}");
        let processor = Arc::clone(&self.processor);

        let result = rt.block_on(self.guard.run(async move { processor.process(item).await }));

        self.counters.active_items.fetch_sub(1, Ordering::Relaxed);
        self.progress.attempted();

        match result {
            Ok(records) => {
                if !records.is_empty() {
                    self.progress.yielded();
                }
                self.counters.completed_items.fetch_add(1, Ordering::Relaxed);
                self.counters.records.fetch_add(records.len() as u64, Ordering::Relaxed);
                WorkerEvent::Completed { seq, records }
            }
            Err(error) => {
                self.counters.failed_items.fetch_add(1, Ordering::Relaxed);
                if matches!(error, HarvestError::DeadlineExceeded { .. }) {
                    self.counters.timed_out_items.fetch_add(1, Ordering::Relaxed);
                }
                debug!(
                    worker_id = self.worker_id,
                    seq = seq,
                    item = %description,
                    error = %error,
                    "Item dropped"
                );
                WorkerEvent::Failed(ItemFailure::new(seq, self.worker_id, description, &error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::executor::FnProcessor;
    use std::sync::atomic::AtomicUsize;

    fn config(workers: usize) -> WorkerPoolConfig {
        WorkerPoolConfig::new()
            .with_worker_count(workers)
            .with_input_capacity(4)
            .with_output_capacity(2)
            .with_deadline(Duration::from_secs(5))
    }

    #[test]
    fn test_run_collects_every_record() {
        let pool = WorkerPool::start(
            config(3),
            FnProcessor::new(|n: u32| async move { Ok(vec![n, n + 100]) }),
        )
        .unwrap();

        let outcome = pool.run(0..20).unwrap();
        let mut records = outcome.records.clone();
        records.sort_unstable();

        let mut expected: Vec<u32> = (0..20).chain(100..120).collect();
        expected.sort_unstable();
        assert_eq!(records, expected);
        assert!(outcome.is_complete());
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn test_manual_protocol_sentinel_count() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let pool = WorkerPool::start(
            config(4),
            FnProcessor::new(move |n: u32| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![n])
                }
            }),
        )
        .unwrap();

        thread::scope(|scope| {
            scope.spawn(|| {
                for n in 0..3 {
                    pool.submit(n).unwrap();
                }
                pool.close_workers().unwrap();
                // Second close sends nothing.
                pool.close_workers().unwrap();
            });
            let outcome = pool.drain_results();
            assert_eq!(outcome.records.len(), 3);
        });

        let stats = pool.stats();
        assert_eq!(stats.sentinels_sent, 4);
        assert_eq!(stats.completed_items, 3);
        assert!(pool.is_closed());
        assert!(matches!(pool.submit(9), Err(PoolError::PoolShutdown)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        pool.shutdown();
    }

    #[test]
    fn test_join_with_timeout_detaches_stuck_worker() {
        let stuck = thread::spawn(|| thread::sleep(Duration::from_secs(10)));
        let started = std::time::Instant::now();
        assert_eq!(join_with_timeout(stuck, Duration::from_millis(50)), JoinStatus::Detached);
        assert!(started.elapsed() < Duration::from_secs(2));

        let quick = thread::spawn(|| {});
        assert_eq!(join_with_timeout(quick, Duration::from_secs(2)), JoinStatus::Joined);

        let panicking = thread::spawn(|| panic!("worker bug"));
        assert_eq!(join_with_timeout(panicking, Duration::from_secs(2)), JoinStatus::Panicked);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = WorkerPool::<u32, u32>::start(
            config(0),
            FnProcessor::new(|n: u32| async move { Ok(vec![n]) }),
        );
        assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
    }
}
