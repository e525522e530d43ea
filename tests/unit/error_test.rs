//! Tests for error types

use std::time::Duration;

use resource_harvester::core::{FailureKind, HarvestError, PoolError};

#[test]
fn test_pool_error_display() {
    assert_eq!(PoolError::QueueFull.to_string(), "input queue is full");
    assert_eq!(PoolError::PoolShutdown.to_string(), "pool is closed to new work");
    assert_eq!(
        PoolError::InvalidConfig("worker_count must be greater than 0".into()).to_string(),
        "invalid configuration: worker_count must be greater than 0"
    );
}

#[test]
fn test_pool_error_is_transparent() {
    let err = HarvestError::from(PoolError::PoolShutdown);
    assert_eq!(err.to_string(), "pool is closed to new work");
}

#[test]
fn test_authentication_failed_display() {
    let err = HarvestError::AuthenticationFailed { attempts: 3 };
    assert_eq!(err.to_string(), "authentication failed after 3 attempts");
}

#[test]
fn test_failure_kind_from_error() {
    let deadline = HarvestError::DeadlineExceeded { budget: Duration::from_secs(1) };
    assert_eq!(FailureKind::from(&deadline), FailureKind::Deadline);
    assert_eq!(FailureKind::from(&HarvestError::WorkerPanic("x".into())), FailureKind::Panic);
    assert_eq!(
        FailureKind::from(&HarvestError::RemoteCallFailed("x".into())),
        FailureKind::Remote
    );
}

#[test]
fn test_io_error_converts() {
    let err: HarvestError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(err, HarvestError::Io(_)));
}
