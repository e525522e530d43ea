//! Core harvesting abstractions: worker pool, deadlines, work sources, aggregation.

pub mod aggregator;
pub mod auth;
pub mod deadline;
pub mod error;
pub mod executor;
pub mod progress;
pub mod remote;
pub mod storage;
pub mod work_source;
pub mod worker_pool;

pub use aggregator::{aggregate, ColumnSummary, ResultRecord, Table};
pub use auth::{authenticate, Connector, CredentialSource, Credentials, StaticCredentials};
pub use deadline::{run_blocking_with_deadline, run_with_deadline, DeadlineGuard};
pub use error::{AppResult, HarvestError};
pub use executor::{BlockingFnProcessor, FnProcessor, ItemProcessor};
pub use progress::{MarkStream, ProgressSink, SilentProgress};
pub use remote::{
    CitationClient, FundingAgency, Identifier, RemoteMetadataClient, ResourceDescriptor,
    ResourceMetadata, SystemMetadata,
};
pub use storage::TableStore;
pub use work_source::{partition, partition_dates, DateInterval, IdentifierList, MAX_PARTITIONS};
pub use worker_pool::{FailureKind, HarvestOutcome, ItemFailure, PoolError, PoolStats, WorkerPool};
