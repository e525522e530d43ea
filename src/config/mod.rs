//! Configuration models for the worker pool and harvest runs.

pub mod pool;

pub use pool::{load_dotenv, HarvestConfig, WorkerPoolConfig};
