//! Per-item processing traits and closure adapters.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::HarvestError;

/// The per-item processing function run by every pool worker.
///
/// One call handles one work item and yields zero or more records. Any error
/// is item-level: the pool records it and moves on to the next item.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use resource_harvester::core::{HarvestError, ItemProcessor};
///
/// struct DoiLookup { client: Arc<HydroShareClient> }
///
/// #[async_trait]
/// impl ItemProcessor<String, ResultRecord> for DoiLookup {
///     async fn process(&self, id: String) -> Result<Vec<ResultRecord>, HarvestError> {
///         let meta = self.client.get_metadata(&id).await?;
///         Ok(doi_record(&id, &meta).into_iter().collect())
///     }
/// }
/// ```
///
/// # Threading
///
/// The processor is shared by all workers behind an `Arc`. Each worker owns a
/// dedicated OS thread with a single-threaded tokio runtime and runs one item
/// at a time, wrapped in the pool's deadline guard.
#[async_trait]
pub trait ItemProcessor<P, R>: Send + Sync + 'static
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Process one item.
    async fn process(&self, item: P) -> Result<Vec<R>, HarvestError>;
}

/// Adapter turning an async closure into an [`ItemProcessor`].
pub struct FnProcessor<F, P, R> {
    f: F,
    _types: PhantomData<fn(P) -> R>,
}

impl<F, P, R> FnProcessor<F, P, R> {
    /// Wrap `f`.
    pub const fn new(f: F) -> Self {
        Self { f, _types: PhantomData }
    }
}

#[async_trait]
impl<F, Fut, P, R> ItemProcessor<P, R> for FnProcessor<F, P, R>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<R>, HarvestError>> + Send + 'static,
    P: Send + 'static,
    R: Send + 'static,
{
    async fn process(&self, item: P) -> Result<Vec<R>, HarvestError> {
        (self.f)(item).await
    }
}

/// Adapter for blocking closures. Each call runs on the worker runtime's
/// blocking thread pool, so a deadline can abandon it without stalling the
/// worker thread.
pub struct BlockingFnProcessor<F, P, R> {
    f: Arc<F>,
    _types: PhantomData<fn(P) -> R>,
}

impl<F, P, R> BlockingFnProcessor<F, P, R> {
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f), _types: PhantomData }
    }
}

#[async_trait]
impl<F, P, R> ItemProcessor<P, R> for BlockingFnProcessor<F, P, R>
where
    F: Fn(P) -> Result<Vec<R>, HarvestError> + Send + Sync + 'static,
    P: Send + 'static,
    R: Send + 'static,
{
    async fn process(&self, item: P) -> Result<Vec<R>, HarvestError> {
        let f = Arc::clone(&self.f);
        tokio::task::spawn_blocking(move || f(item))
            .await
            .map_err(|e| HarvestError::WorkerPanic(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_processor_calls_closure() {
        let processor = FnProcessor::new(|n: u32| async move { Ok(vec![n, n * 10]) });
        assert_eq!(processor.process(3).await.unwrap(), vec![3, 30]);
    }

    #[tokio::test]
    async fn test_blocking_processor_propagates_error() {
        let processor = BlockingFnProcessor::new(|id: String| -> Result<Vec<String>, HarvestError> {
            if id == "bad" {
                Err(HarvestError::RemoteCallFailed(id))
            } else {
                Ok(vec![id])
            }
        });

        assert_eq!(processor.process("ok".into()).await.unwrap(), vec!["ok".to_string()]);
        assert!(matches!(
            processor.process("bad".into()).await,
            Err(HarvestError::RemoteCallFailed(_))
        ));
    }
}
