//! Worker pool and harvest configuration structures.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::util::clock::today;

/// Default per-call deadline observed against the remote API.
pub const DEFAULT_DEADLINE_SECS: u64 = 10;
/// Default number of discovery intervals.
pub const DEFAULT_PARTITIONS: usize = 1000;
/// Default authentication retry budget.
pub const DEFAULT_AUTH_ATTEMPTS: u32 = 3;
/// Default capacity of each pool queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
/// Default remote host.
pub const DEFAULT_HOST: &str = "www.hydroshare.org";
/// Default citation index endpoint.
pub const DEFAULT_CITATION_URL: &str = "https://api.crossref.org";

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Capacity of the input queue; `submit` blocks beyond it.
    pub input_capacity: usize,
    /// Capacity of the output queue; workers block beyond it until drained.
    pub output_capacity: usize,
    /// Wall-clock budget per item.
    pub deadline: Duration,
    /// Stack size of each worker thread in bytes.
    pub thread_stack_size: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            input_capacity: DEFAULT_QUEUE_CAPACITY,
            output_capacity: DEFAULT_QUEUE_CAPACITY,
            deadline: Duration::from_secs(DEFAULT_DEADLINE_SECS),
            thread_stack_size: 2 * 1024 * 1024,
        }
    }
}

impl WorkerPoolConfig {
    /// Defaults: one worker per CPU, 1024-slot queues, 10 s deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of workers.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the input queue capacity.
    #[must_use]
    pub const fn with_input_capacity(mut self, capacity: usize) -> Self {
        self.input_capacity = capacity;
        self
    }

    /// Set the output queue capacity.
    #[must_use]
    pub const fn with_output_capacity(mut self, capacity: usize) -> Self {
        self.output_capacity = capacity;
        self
    }

    /// Set the per-item deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.input_capacity == 0 {
            return Err("input_capacity must be greater than 0".into());
        }
        if self.output_capacity == 0 {
            return Err("output_capacity must be greater than 0".into());
        }
        if self.deadline.is_zero() {
            return Err("deadline must be greater than 0".into());
        }
        Ok(())
    }
}

/// Settings for one harvest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Remote host name.
    pub host: String,
    /// Use https when talking to the host.
    pub use_https: bool,
    /// Directory holding checkpoints and outputs.
    pub working_dir: PathBuf,
    /// First creation date to discover.
    pub begin: NaiveDate,
    /// Last creation date to discover (exclusive); today when unset.
    pub end: Option<NaiveDate>,
    /// Number of discovery intervals.
    pub partitions: usize,
    /// Worker count; one per CPU when unset.
    pub worker_count: Option<usize>,
    /// Per-item deadline in seconds.
    pub deadline_secs: u64,
    /// Authentication attempts before giving up.
    pub auth_attempts: u32,
    /// Input queue capacity.
    pub input_capacity: usize,
    /// Output queue capacity.
    pub output_capacity: usize,
    /// Ignore existing checkpoints.
    pub force: bool,
    /// Citation index queried for DOI citation counts.
    pub citation_url: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            use_https: true,
            working_dir: PathBuf::from("."),
            begin: NaiveDate::from_ymd_opt(2015, 5, 1).unwrap_or_default(),
            end: None,
            partitions: DEFAULT_PARTITIONS,
            worker_count: None,
            deadline_secs: DEFAULT_DEADLINE_SECS,
            auth_attempts: DEFAULT_AUTH_ATTEMPTS,
            input_capacity: DEFAULT_QUEUE_CAPACITY,
            output_capacity: DEFAULT_QUEUE_CAPACITY,
            force: false,
            citation_url: DEFAULT_CITATION_URL.to_string(),
        }
    }
}

impl HarvestConfig {
    /// Validate harvest settings.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("host must not be empty".into());
        }
        if self.partitions == 0 {
            return Err("partitions must be greater than 0".into());
        }
        if self.citation_url.trim().is_empty() {
            return Err("citation_url must not be empty".into());
        }
        if self.auth_attempts == 0 {
            return Err("auth_attempts must be greater than 0".into());
        }
        if self.begin >= self.end_date() {
            return Err(format!(
                "begin {} must be before end {}",
                self.begin,
                self.end_date()
            ));
        }
        self.pool_config().validate()
    }

    /// Parse harvest configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a message on parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `HARVEST_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a message when a variable is set but cannot be parsed.
    pub fn apply_env(&mut self) -> Result<(), String> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply `HARVEST_*` overrides from an arbitrary lookup.
    ///
    /// # Errors
    ///
    /// Returns a message when a variable is set but cannot be parsed.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
            value
                .trim()
                .parse()
                .map_err(|_| format!("{key}: cannot parse `{value}`"))
        }

        if let Some(v) = lookup("HARVEST_HOST") {
            self.host = v;
        }
        if let Some(v) = lookup("HARVEST_WORKING_DIR") {
            self.working_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("HARVEST_BEGIN") {
            self.begin = parse("HARVEST_BEGIN", &v)?;
        }
        if let Some(v) = lookup("HARVEST_END") {
            self.end = Some(parse("HARVEST_END", &v)?);
        }
        if let Some(v) = lookup("HARVEST_PARTITIONS") {
            self.partitions = parse("HARVEST_PARTITIONS", &v)?;
        }
        if let Some(v) = lookup("HARVEST_WORKERS") {
            self.worker_count = Some(parse("HARVEST_WORKERS", &v)?);
        }
        if let Some(v) = lookup("HARVEST_DEADLINE_SECS") {
            self.deadline_secs = parse("HARVEST_DEADLINE_SECS", &v)?;
        }
        if let Some(v) = lookup("HARVEST_CITATION_URL") {
            self.citation_url = v;
        }
        if let Some(v) = lookup("HARVEST_USE_HTTPS") {
            self.use_https = parse("HARVEST_USE_HTTPS", &v)?;
        }
        Ok(())
    }

    /// End of the discovery range.
    #[must_use]
    pub fn end_date(&self) -> NaiveDate {
        self.end.unwrap_or_else(today)
    }

    /// Worker pool settings derived from this harvest.
    #[must_use]
    pub fn pool_config(&self) -> WorkerPoolConfig {
        let mut cfg = WorkerPoolConfig::new()
            .with_input_capacity(self.input_capacity)
            .with_output_capacity(self.output_capacity)
            .with_deadline(Duration::from_secs(self.deadline_secs));
        if let Some(workers) = self.worker_count {
            cfg = cfg.with_worker_count(workers);
        }
        cfg
    }
}

/// Load a `.env` file from the current directory or its parents, if present.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}
