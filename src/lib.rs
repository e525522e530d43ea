//! # Resource Harvester
//!
//! A bounded-queue worker pool for harvesting per-resource metadata from a
//! remote content-repository API that is slow and occasionally unreliable.
//!
//! The crate enumerates resource identifiers by splitting a creation-date range
//! into sub-intervals, then fetches metadata (funding agencies, DOIs,
//! publication status) for every discovered identifier. Both stages run on the
//! same worker pool engine; only the per-item processing function and the shape
//! of the produced records differ.
//!
//! ## Core Problem Solved
//!
//! - **Hard per-call deadlines**: one stalled remote call never stalls a worker
//! - **Clean termination**: one sentinel per worker, every worker observes it
//! - **No lost results**: the output queue is drained while workers run, so a
//!   full output buffer can never keep a worker from reaching its sentinel
//! - **Proven completion**: every item is acknowledged by the worker that ran
//!   it, so a drain is known to be complete instead of guessed from an empty
//!   input queue
//! - **Restartable**: identifier lists and final tables are checkpointed to disk
//!
//! ## WorkerPool
//!
//! ```rust,ignore
//! use resource_harvester::config::WorkerPoolConfig;
//! use resource_harvester::core::{FnProcessor, WorkerPool};
//! use std::time::Duration;
//!
//! let pool = WorkerPool::start(
//!     WorkerPoolConfig::new()
//!         .with_worker_count(4)
//!         .with_deadline(Duration::from_secs(10)),
//!     FnProcessor::new(|id: String| async move { Ok(vec![id.len()]) }),
//! )?;
//!
//! let outcome = pool.run(vec!["r1".to_string(), "r2".to_string()])?;
//! assert_eq!(outcome.records.len(), 2);
//! ```
//!
//! ## HarvestCoordinator
//!
//! The coordinator sequences discovery and metadata harvesting, checkpoints the
//! identifier list, and persists the final table. See `src/bin/harvest.rs` for
//! the command-line entry point.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core harvesting abstractions: worker pool, deadlines, work sources, aggregation.
pub mod core;
/// Configuration models for the worker pool and harvest runs.
pub mod config;
/// Funding and DOI harvests and the coordinator that runs them.
pub mod harvest;
/// Infrastructure adapters for persistence, the remote API, and credential prompts.
pub mod infra;
/// Shared utilities.
pub mod util;
