//! The reconciliation controller — the state machine that drives a mutation
//! from invocation through optimistic prediction to its terminal outcome.
//!
//! Lifecycle per invocation: Idle → Mutating → Resolved(success | error).
//! Configuration errors abort synchronously, before the mutating flag flips
//! and before any network traffic. Backend failures never reject the call —
//! they resolve as a result with `status: Error` and travel through the
//! error callback, so callers never need to catch ordinary failures.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::TableBackend;
use crate::cache::{CacheMutateOptions, MutationFuture, OptimisticDataFn, QueryCache};
use crate::error::{RemoteOperationError, Result};
use crate::events::{EventEmitter, ProviderEvent, SubscriptionId};
use crate::mutation::{
    mutation_phrases, validate_mutation_request, ExecutorOptions, MutationExecutor,
    MutationPhrases,
};
use crate::optimistic::{
    derive_operation, select_transform, OptimisticInput, OptimisticOperation, Transform,
    TransformContext,
};
use crate::query::{Filter, OrderBy, SelectParams};
use crate::types::{
    mark_optimistic, ActionAttempted, CountMode, MutateResult, MutateResultCallback, MutateStatus,
    MutationRequest, ProviderError, ProviderErrorCallback, ResultEnvelope,
};

// ============================================================================
// Options
// ============================================================================

/// Configuration for `Provider`.
pub struct ProviderOptions {
    pub backend: Arc<dyn TableBackend>,
    pub cache: Arc<dyn QueryCache>,
    pub table_name: String,
    /// Field used to match a row across predicted and real state.
    /// Defaults to `"id"` via `ProviderOptions::new`.
    pub unique_identifier_field: String,
    pub filters: Vec<Filter>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub return_count: CountMode,
    /// Called once with the terminal result of a successful mutation.
    pub on_mutate_success: Option<Arc<MutateResultCallback>>,
    /// Called once per failed mutation or fetch.
    pub on_error: Option<Arc<ProviderErrorCallback>>,
    pub add_delay_for_testing: bool,
    pub simulate_random_fetch_errors: bool,
    pub simulate_random_mutation_errors: bool,
}

impl ProviderOptions {
    pub fn new(
        backend: Arc<dyn TableBackend>,
        cache: Arc<dyn QueryCache>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            cache,
            table_name: table_name.into(),
            unique_identifier_field: "id".to_string(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            return_count: CountMode::None,
            on_mutate_success: None,
            on_error: None,
            add_delay_for_testing: false,
            simulate_random_fetch_errors: false,
            simulate_random_mutation_errors: false,
        }
    }
}

// ============================================================================
// Provider
// ============================================================================

pub struct Provider {
    executor: Arc<MutationExecutor>,
    backend: Arc<dyn TableBackend>,
    table_name: String,
    unique_identifier_field: String,
    filters: Vec<Filter>,
    order_by: Vec<OrderBy>,
    limit: Option<usize>,
    offset: Option<usize>,
    return_count: CountMode,
    add_delay_for_testing: bool,
    simulate_random_fetch_errors: bool,
    /// State shared with detached continuations of `return_immediately`
    /// mutations.
    shared: Arc<SharedState>,
    last_fetch_error: Mutex<Option<ProviderError>>,
}

/// The slice of controller state a background continuation drives: the
/// cache, the callbacks, and the mutating flag with its event channel.
struct SharedState {
    cache: Arc<dyn QueryCache>,
    on_mutate_success: Option<Arc<MutateResultCallback>>,
    on_error: Option<Arc<ProviderErrorCallback>>,
    is_mutating: AtomicBool,
    events: EventEmitter<ProviderEvent>,
}

impl SharedState {
    fn set_mutating(&self, value: bool) {
        if self.is_mutating.swap(value, Ordering::SeqCst) != value {
            self.events.emit(&ProviderEvent::MutatingChanged(value));
        }
    }

    /// Await the real mutation through the cache, build the terminal result,
    /// and fire exactly one terminal callback.
    async fn settle(
        &self,
        mutation: MutationFuture,
        optimistic_fn: OptimisticDataFn,
        request: &MutationRequest,
        optimistic_value: Option<Value>,
        phrases: MutationPhrases,
    ) -> MutateResult {
        let outcome = self
            .cache
            .mutate(mutation, optimistic_fn, CacheMutateOptions::reconcile())
            .await;

        let result = match outcome {
            Ok(envelope) => {
                debug!(kind = ?request.kind, "mutation succeeded");
                let result = MutateResult {
                    data: envelope.data,
                    count: envelope.count,
                    optimistic_data: optimistic_value,
                    optimistic_count: request.optimistic_count,
                    payload: request.payload.to_value(),
                    action: request.kind,
                    summary: phrases.success.to_string(),
                    status: MutateStatus::Success,
                    error: None,
                    custom_metadata: request.custom_metadata.clone(),
                };
                if let Some(ref on_success) = self.on_mutate_success {
                    fire(|| on_success(&result));
                }
                result
            }
            Err(error) => {
                warn!(kind = ?request.kind, %error, "mutation failed");
                let provider_error = ProviderError::from_error(
                    &error,
                    request.kind.into(),
                    phrases.error,
                    request.payload.to_value(),
                    optimistic_value.clone(),
                    request.custom_metadata.clone(),
                );
                if let Some(ref on_error) = self.on_error {
                    fire(|| on_error(&provider_error));
                }
                MutateResult {
                    data: None,
                    count: None,
                    optimistic_data: optimistic_value,
                    optimistic_count: request.optimistic_count,
                    payload: request.payload.to_value(),
                    action: request.kind,
                    summary: phrases.error.to_string(),
                    status: MutateStatus::Error,
                    error: Some(provider_error),
                    custom_metadata: request.custom_metadata.clone(),
                }
            }
        };

        self.set_mutating(false);
        self.events.emit(&ProviderEvent::MutationSettled {
            status: result.status,
        });
        result
    }
}

impl Provider {
    pub fn new(options: ProviderOptions) -> Self {
        let executor = Arc::new(MutationExecutor::new(ExecutorOptions {
            backend: Arc::clone(&options.backend),
            table_name: options.table_name.clone(),
            unique_identifier_field: options.unique_identifier_field.clone(),
            add_delay_for_testing: options.add_delay_for_testing,
            simulate_random_mutation_errors: options.simulate_random_mutation_errors,
        }));

        Self {
            executor,
            backend: options.backend,
            table_name: options.table_name,
            unique_identifier_field: options.unique_identifier_field,
            filters: options.filters,
            order_by: options.order_by,
            limit: options.limit,
            offset: options.offset,
            return_count: options.return_count,
            add_delay_for_testing: options.add_delay_for_testing,
            simulate_random_fetch_errors: options.simulate_random_fetch_errors,
            shared: Arc::new(SharedState {
                cache: options.cache,
                on_mutate_success: options.on_mutate_success,
                on_error: options.on_error,
                is_mutating: AtomicBool::new(false),
                events: EventEmitter::new(),
            }),
            last_fetch_error: Mutex::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // State interface
    // -----------------------------------------------------------------------

    /// Whether a mutation is currently in flight.
    pub fn is_mutating(&self) -> bool {
        self.shared.is_mutating.load(Ordering::SeqCst)
    }

    /// The error from the most recent failed fetch, if any.
    pub fn last_fetch_error(&self) -> Option<ProviderError> {
        self.last_fetch_error.lock().clone()
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(
        &self,
        listener: impl Fn(&ProviderEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.shared.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.shared.events.unsubscribe(id)
    }

    // -----------------------------------------------------------------------
    // Mutation entry point
    // -----------------------------------------------------------------------

    /// Run one mutation with optimistic reconciliation.
    ///
    /// Configuration errors (validation, unrecognized optimistic operation,
    /// unusable optimistic input) return `Err` synchronously — before the
    /// mutating flag is set and before any network call. Once the mutation
    /// is issued the returned future always resolves `Ok`: with the terminal
    /// result, or — when `return_immediately` is set — with a `Pending`
    /// result while a detached task drives the mutation and its callbacks to
    /// completion.
    pub async fn mutate(&self, request: MutationRequest) -> Result<MutateResult> {
        let phrases = mutation_phrases(request.kind);

        // Parse the flexible optimistic-operation literal first so an
        // unrecognized value fails with the action label in the message.
        let requested_operation = match &request.flexible {
            Some(settings) => OptimisticOperation::parse(
                settings.optimistic_operation.as_deref(),
                phrases.action_label,
            )?,
            None => None,
        };

        validate_mutation_request(&request, requested_operation)?;

        // Mark the optimistic row and pick the transform.
        let input = match (&request.optimistic_row, &request.optimistic_data) {
            (Some(row), _) => OptimisticInput::Row(mark_optimistic(row)),
            (None, Some(rows)) => OptimisticInput::Data(rows.clone()),
            (None, None) => OptimisticInput::None,
        };
        let operation = derive_operation(request.kind, !input.is_none(), requested_operation);
        let transform = select_transform(operation);

        // Dry-run the transform against the current view so an unusable
        // optimistic input aborts before the backend is involved, and the
        // predicted envelope exists before the network call is issued.
        let snapshot = self.shared.cache.snapshot();
        let ctx = TransformContext {
            order: &self.order_by,
            count: self.return_count,
            unique_identifier_field: &self.unique_identifier_field,
        };
        transform.apply(snapshot.as_ref(), &input, request.optimistic_count, &ctx)?;

        self.shared.set_mutating(true);
        debug!(kind = ?request.kind, table = %self.table_name, "mutation started");

        let optimistic_value = input.to_value();
        let optimistic_fn = self.build_optimistic_fn(transform, input, request.optimistic_count);
        let mutation: MutationFuture = {
            let executor = Arc::clone(&self.executor);
            let request = request.clone();
            Box::pin(async move { executor.execute(&request).await })
        };

        if request.return_immediately {
            let pending = MutateResult {
                data: None,
                count: None,
                optimistic_data: optimistic_value.clone(),
                optimistic_count: request.optimistic_count,
                payload: request.payload.to_value(),
                action: request.kind,
                summary: phrases.in_progress.to_string(),
                status: MutateStatus::Pending,
                error: None,
                custom_metadata: request.custom_metadata.clone(),
            };

            // Fire-and-continue: the detached task always drives the
            // callbacks, whether or not the caller kept the pending result.
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                shared
                    .settle(mutation, optimistic_fn, &request, optimistic_value, phrases)
                    .await;
            });

            return Ok(pending);
        }

        Ok(self
            .shared
            .settle(mutation, optimistic_fn, &request, optimistic_value, phrases)
            .await)
    }

    fn build_optimistic_fn(
        &self,
        transform: Transform,
        input: OptimisticInput,
        optimistic_count: Option<i64>,
    ) -> OptimisticDataFn {
        let order = self.order_by.clone();
        let count = self.return_count;
        let unique_identifier_field = self.unique_identifier_field.clone();

        Box::new(move |current| {
            let ctx = TransformContext {
                order: &order,
                count,
                unique_identifier_field: &unique_identifier_field,
            };
            // The dry run in `mutate` already proved this input usable.
            transform
                .apply(current, &input, optimistic_count, &ctx)
                .unwrap_or_else(|_| crate::optimistic::return_unchanged(current))
        })
    }

    // -----------------------------------------------------------------------
    // Fetch
    // -----------------------------------------------------------------------

    /// Fetch the provider's rows from the backend.
    ///
    /// On failure, stores and returns a `ProviderError` with
    /// `action_attempted: Select` and fires the error callback.
    pub async fn fetch(&self) -> Result<ResultEnvelope> {
        self.last_fetch_error.lock().take();

        let outcome = self.fetch_inner().await;
        if let Err(ref error) = outcome {
            warn!(table = %self.table_name, %error, "fetch failed");
            let provider_error = ProviderError::from_error(
                error,
                ActionAttempted::Select,
                "Error fetching records",
                None,
                None,
                None,
            );
            *self.last_fetch_error.lock() = Some(provider_error.clone());
            if let Some(ref on_error) = self.shared.on_error {
                fire(|| on_error(&provider_error));
            }
        }
        outcome
    }

    async fn fetch_inner(&self) -> Result<ResultEnvelope> {
        if self.add_delay_for_testing {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        if self.simulate_random_fetch_errors && rand::random::<f64>() > 0.5 {
            return Err(RemoteOperationError::new("Simulated random fetch error").into());
        }

        let params = SelectParams {
            filters: self.filters.clone(),
            order: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            count: self.return_count,
        };
        self.backend
            .select(&self.table_name, &params)
            .await
            .into_envelope()
    }

    /// Refetch the authoritative data through the cache.
    pub async fn refetch_rows(&self) -> Result<ResultEnvelope> {
        self.shared.cache.revalidate().await
    }
}

/// Invoke a caller-supplied callback, swallowing panics — a misbehaving
/// listener must not break reconciliation.
fn fire(callback: impl FnOnce()) {
    let _ = catch_unwind(AssertUnwindSafe(callback));
}
