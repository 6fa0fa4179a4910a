//! In-memory reference cache, backed by a caller-supplied fetcher.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CacheMutateOptions, FetchFuture, MutationFuture, OptimisticDataFn, QueryCache};
use crate::backend::TableBackend;
use crate::error::Result;
use crate::query::SelectParams;
use crate::types::ResultEnvelope;

/// Produces a fresh fetch of the authoritative data.
pub type FetcherFn = dyn Fn() -> FetchFuture + Send + Sync;

pub struct MemoryCache {
    current: Mutex<Option<ResultEnvelope>>,
    fetcher: Arc<FetcherFn>,
}

impl MemoryCache {
    pub fn new(fetcher: impl Fn() -> FetchFuture + Send + Sync + 'static) -> Self {
        Self {
            current: Mutex::new(None),
            fetcher: Arc::new(fetcher),
        }
    }

    /// Start from a known cache value instead of empty.
    pub fn with_initial(
        initial: ResultEnvelope,
        fetcher: impl Fn() -> FetchFuture + Send + Sync + 'static,
    ) -> Self {
        Self {
            current: Mutex::new(Some(initial)),
            fetcher: Arc::new(fetcher),
        }
    }

    /// Convenience constructor: revalidate by selecting from `backend`.
    pub fn for_table(
        backend: Arc<dyn TableBackend>,
        table: impl Into<String>,
        params: SelectParams,
    ) -> Self {
        let table = table.into();
        Self::new(move || {
            let backend = Arc::clone(&backend);
            let table = table.clone();
            let params = params.clone();
            Box::pin(async move { backend.select(&table, &params).await.into_envelope() })
        })
    }

    fn set(&self, value: Option<ResultEnvelope>) {
        *self.current.lock() = value;
    }
}

#[async_trait]
impl QueryCache for MemoryCache {
    fn snapshot(&self) -> Option<ResultEnvelope> {
        self.current.lock().clone()
    }

    async fn mutate(
        &self,
        mutation: MutationFuture,
        optimistic: OptimisticDataFn,
        options: CacheMutateOptions,
    ) -> Result<ResultEnvelope> {
        let previous = self.snapshot();

        // Show the prediction immediately, before the mutation settles.
        let predicted = optimistic(previous.as_ref());
        self.set(Some(predicted));

        let outcome = mutation.await;

        match &outcome {
            Ok(result) => {
                if options.populate_cache {
                    self.set(Some(result.clone()));
                }
            }
            Err(_) => {
                if options.rollback_on_error {
                    self.set(previous);
                }
            }
        }

        if options.revalidate {
            // A failed revalidation keeps the rolled-back value in place.
            if let Ok(fresh) = (self.fetcher)().await {
                self.set(Some(fresh));
            }
        }

        outcome
    }

    async fn revalidate(&self) -> Result<ResultEnvelope> {
        let fresh = (self.fetcher)().await?;
        self.set(Some(fresh.clone()));
        Ok(fresh)
    }
}

// ============================================================================
// Tests
// ============================================================================
