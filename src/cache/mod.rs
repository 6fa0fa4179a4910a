//! Cache/revalidation collaborator — the view-layer cache the
//! reconciliation controller drives.
//!
//! The contract mirrors a stale-while-revalidate cache's bound `mutate`:
//! show a predicted value while the real mutation is in flight, roll the
//! prediction back if the mutation fails, then revalidate against the
//! authoritative source so the predicted state is never left standing once
//! the real outcome is known.

pub mod memory;

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ResultEnvelope;

pub use memory::MemoryCache;

/// The in-flight mutation handed to the cache.
pub type MutationFuture = Pin<Box<dyn Future<Output = Result<ResultEnvelope>> + Send + 'static>>;

/// Computes the predicted envelope from the current cache state.
pub type OptimisticDataFn = Box<dyn Fn(Option<&ResultEnvelope>) -> ResultEnvelope + Send + Sync>;

/// A fetch of the authoritative data, used for revalidation.
pub type FetchFuture = MutationFuture;

/// Options controlling a cache mutate cycle.
#[derive(Debug, Clone, Copy)]
pub struct CacheMutateOptions {
    /// Keep the mutation's own result as the cache value.
    pub populate_cache: bool,
    /// Refetch the authoritative data after the mutation settles.
    pub revalidate: bool,
    /// Restore the pre-mutation value if the mutation fails.
    pub rollback_on_error: bool,
}

impl CacheMutateOptions {
    /// The reconciliation contract: never populate from the mutation result,
    /// always revalidate, always roll back on error.
    pub fn reconcile() -> Self {
        Self {
            populate_cache: false,
            revalidate: true,
            rollback_on_error: true,
        }
    }
}

/// The external cache, at its interface boundary.
#[async_trait]
pub trait QueryCache: Send + Sync {
    /// Current cache value. Used to compute the optimistic prediction
    /// synchronously before any network call is issued.
    fn snapshot(&self) -> Option<ResultEnvelope>;

    /// Run a mutation with optimistic display: apply `optimistic` to the
    /// current value immediately, await `mutation`, then settle according to
    /// `options`. Returns the mutation's own outcome.
    async fn mutate(
        &self,
        mutation: MutationFuture,
        optimistic: OptimisticDataFn,
        options: CacheMutateOptions,
    ) -> Result<ResultEnvelope>;

    /// Refetch the authoritative data and make it the cache value.
    async fn revalidate(&self) -> Result<ResultEnvelope>;
}
