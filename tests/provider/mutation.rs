//! Reconciliation controller tests: the full mutate lifecycle against a
//! recording backend — success, failure with rollback, the
//! return-immediately ordering guarantee, and the synchronous abort paths.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use optimistic_provider::cache::{MemoryCache, QueryCache};
use optimistic_provider::error::Error;
use optimistic_provider::events::ProviderEvent;
use optimistic_provider::provider::{Provider, ProviderOptions};
use optimistic_provider::query::SelectParams;
use optimistic_provider::types::{
    is_optimistic, ActionAttempted, CountMode, FlexibleMutationSettings, FlexibleOperation,
    MutateStatus, MutationKind, MutationPayload, MutationRequest,
};

use super::support::{row, rows, wait_until, MockBackend};

struct Harness {
    backend: Arc<MockBackend>,
    cache: Arc<MemoryCache>,
    provider: Arc<Provider>,
    success_calls: Arc<AtomicUsize>,
    error_calls: Arc<AtomicUsize>,
    log: Arc<Mutex<Vec<&'static str>>>,
}

async fn harness(initial: serde_json::Value, count: CountMode) -> Harness {
    let backend = Arc::new(MockBackend::new(rows(initial)));
    let cache = Arc::new(MemoryCache::for_table(
        backend.clone() as Arc<dyn optimistic_provider::backend::TableBackend>,
        "people",
        SelectParams {
            count,
            ..SelectParams::default()
        },
    ));
    // Warm the cache so predictions have a current value to start from.
    cache.revalidate().await.unwrap();

    let success_calls = Arc::new(AtomicUsize::new(0));
    let error_calls = Arc::new(AtomicUsize::new(0));
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let mut options = ProviderOptions::new(
        backend.clone() as Arc<dyn optimistic_provider::backend::TableBackend>,
        cache.clone() as Arc<dyn QueryCache>,
        "people",
    );
    options.return_count = count;
    options.on_mutate_success = Some({
        let success_calls = Arc::clone(&success_calls);
        let log = Arc::clone(&log);
        Arc::new(move |_result| {
            success_calls.fetch_add(1, Ordering::SeqCst);
            log.lock().push("success-callback");
        })
    });
    options.on_error = Some({
        let error_calls = Arc::clone(&error_calls);
        let log = Arc::clone(&log);
        Arc::new(move |_error| {
            error_calls.fetch_add(1, Ordering::SeqCst);
            log.lock().push("error-callback");
        })
    });

    Harness {
        backend,
        cache,
        provider: Arc::new(Provider::new(options)),
        success_calls,
        error_calls,
        log,
    }
}

fn insert_request(payload: serde_json::Value, optimistic: Option<serde_json::Value>) -> MutationRequest {
    let mut request = MutationRequest::new(MutationKind::Insert);
    request.payload = MutationPayload::Single(row(payload));
    request.optimistic_row = optimistic.map(row);
    request
}

// ---------------------------------------------------------------------------
// Success path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_insert_reconciles_and_fires_success_once() {
    let h = harness(json!([{"id": 1, "name": "Bob"}]), CountMode::Exact).await;

    let mut request = insert_request(
        json!({"id": 2, "name": "Alice"}),
        Some(json!({"id": 2, "name": "Alice"})),
    );
    request.should_return_row = true;

    let result = h.provider.mutate(request).await.unwrap();

    assert_eq!(result.status, MutateStatus::Success);
    assert_eq!(result.summary, "Successfully added row");
    assert_eq!(result.action, MutationKind::Insert);
    assert!(result.error.is_none());

    // Read-back returned the real inserted row.
    let data = result.data.as_ref().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["name"], json!("Alice"));

    // The prediction input is retained on the result, marked.
    let optimistic = result.optimistic_data.as_ref().unwrap().as_object().unwrap();
    assert_eq!(optimistic["isOptimistic"], json!(true));
    assert!(optimistic["optimisticId"].is_string());

    assert_eq!(h.success_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.error_calls.load(Ordering::SeqCst), 0);

    // Revalidation replaced the prediction with the authoritative rows.
    let settled = h.cache.snapshot().unwrap();
    assert_eq!(settled.rows().len(), 2);
    assert!(settled.rows().iter().all(|r| !is_optimistic(r)));
    assert_eq!(settled.count, Some(2));

    assert!(!h.provider.is_mutating());
}

// ---------------------------------------------------------------------------
// Failure path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_mutation_resolves_with_error_and_rolls_back() {
    let h = harness(json!([{"id": 1, "name": "Bob"}]), CountMode::Exact).await;
    let before = h.cache.snapshot().unwrap();
    h.backend.fail_mutations();

    let request = insert_request(
        json!({"id": 2, "name": "Alice"}),
        Some(json!({"id": 2, "name": "Alice"})),
    );

    // Resolves, never rejects, on a backend failure.
    let result = h.provider.mutate(request).await.unwrap();

    assert_eq!(result.status, MutateStatus::Error);
    assert_eq!(result.summary, "Error adding row");
    assert_eq!(result.data, None);

    let error = result.error.as_ref().unwrap();
    assert_eq!(error.action_attempted, ActionAttempted::Insert);
    assert_eq!(error.summary, "Error adding row");
    assert!(error.error_message.contains("duplicate key"));
    assert!(error.optimistic_data.is_some());

    assert_eq!(h.error_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.success_calls.load(Ordering::SeqCst), 0);

    // The prediction never survives: a follow-up view shows pre-mutation data.
    assert_eq!(h.cache.snapshot().unwrap(), before);
    assert!(!h.provider.is_mutating());
}

#[tokio::test]
async fn error_ids_are_unique_per_failed_attempt() {
    let h = harness(json!([]), CountMode::None).await;
    h.backend.fail_mutations();

    let first = h
        .provider
        .mutate(insert_request(json!({"id": 1}), None))
        .await
        .unwrap();
    let second = h
        .provider
        .mutate(insert_request(json!({"id": 1}), None))
        .await
        .unwrap();

    assert_ne!(
        first.error.unwrap().error_id,
        second.error.unwrap().error_id
    );
}

// ---------------------------------------------------------------------------
// return_immediately ordering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn return_immediately_resolves_pending_before_the_terminal_callback() {
    let h = harness(json!([{"id": 1, "name": "Bob"}]), CountMode::Exact).await;
    h.backend.gate_mutations();

    let mut request = insert_request(
        json!({"id": 2, "name": "Alice"}),
        Some(json!({"id": 2, "name": "Alice"})),
    );
    request.return_immediately = true;

    let pending = h.provider.mutate(request).await.unwrap();
    h.log.lock().push("pending-resolved");

    assert_eq!(pending.status, MutateStatus::Pending);
    assert_eq!(pending.summary, "Add row in progress");
    assert_eq!(pending.data, None);
    assert!(pending.optimistic_data.is_some());

    // While the backend is held, the cache shows the prediction.
    {
        let cache = Arc::clone(&h.cache);
        wait_until(move || {
            cache
                .snapshot()
                .map(|env| env.rows().len() == 2)
                .unwrap_or(false)
        })
        .await;
    }
    let predicted = h.cache.snapshot().unwrap();
    assert!(predicted.rows().iter().any(is_optimistic));
    assert_eq!(predicted.count, Some(2));
    assert!(h.provider.is_mutating());

    // Release the backend; the background continuation still drives the
    // terminal callback.
    h.backend.release();
    {
        let success_calls = Arc::clone(&h.success_calls);
        wait_until(move || success_calls.load(Ordering::SeqCst) == 1).await;
    }

    let log = h.log.lock();
    let pending_at = log.iter().position(|e| *e == "pending-resolved").unwrap();
    let success_at = log.iter().position(|e| *e == "success-callback").unwrap();
    assert!(
        pending_at < success_at,
        "pending must resolve strictly before the terminal callback: {log:?}"
    );
    drop(log);

    {
        let provider = Arc::clone(&h.provider);
        wait_until(move || !provider.is_mutating()).await;
    }
    assert!(h.cache.snapshot().unwrap().rows().iter().all(|r| !is_optimistic(r)));
}

// ---------------------------------------------------------------------------
// Synchronous abort paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn both_optimistic_inputs_abort_before_any_network_call() {
    let h = harness(json!([{"id": 1}]), CountMode::None).await;
    let selects_before = h.backend.select_calls();

    let mut request = insert_request(json!({"id": 2}), Some(json!({"id": 2})));
    request.optimistic_data = Some(rows(json!([{"id": 2}])));

    let err = h.provider.mutate(request).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    assert_eq!(h.backend.mutation_calls(), 0);
    assert_eq!(h.backend.select_calls(), selects_before);
    assert_eq!(h.error_calls.load(Ordering::SeqCst), 0);
    assert!(!h.provider.is_mutating());
}

#[tokio::test]
async fn unrecognized_flexible_optimistic_literal_aborts_synchronously() {
    let h = harness(json!([]), CountMode::None).await;

    let mut request = MutationRequest::new(MutationKind::FlexibleMutation);
    request.payload = MutationPayload::Single(row(json!({"id": 1})));
    request.optimistic_data = Some(rows(json!([{"id": 1}])));
    request.flexible = Some(FlexibleMutationSettings {
        table_name: "orders".to_string(),
        operation: FlexibleOperation::Insert,
        filters: vec![],
        optimistic_operation: Some("bogus".to_string()),
    });

    let err = h.provider.mutate(request).await.unwrap_err();
    assert!(matches!(err, Error::InvalidOptimisticOperation(_)));
    let msg = err.to_string();
    assert!(msg.contains("bogus"));
    assert!(msg.contains("Flexible Mutation"));

    assert_eq!(h.backend.mutation_calls(), 0);
    assert!(!h.provider.is_mutating());
}

#[tokio::test]
async fn unusable_delete_prediction_aborts_before_the_backend() {
    let h = harness(json!([{"id": 1}]), CountMode::None).await;

    let mut request = MutationRequest::new(MutationKind::Delete);
    request.payload = MutationPayload::Single(row(json!({"id": 1})));
    request.optimistic_row = Some(row(json!({"id": {"nested": true}})));

    let err = h.provider.mutate(request).await.unwrap_err();
    assert!(matches!(err, Error::InvalidOptimisticInput(_)));
    assert_eq!(h.backend.mutation_calls(), 0);
    assert!(!h.provider.is_mutating());
}

// ---------------------------------------------------------------------------
// Events & state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lifecycle_events_cover_the_state_machine() {
    let h = harness(json!([]), CountMode::None).await;

    let seen: Arc<Mutex<Vec<ProviderEvent>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        h.provider.subscribe(move |event| seen.lock().push(event.clone()));
    }

    h.provider
        .mutate(insert_request(json!({"id": 1}), None))
        .await
        .unwrap();

    let events = seen.lock().clone();
    assert_eq!(
        events,
        vec![
            ProviderEvent::MutatingChanged(true),
            ProviderEvent::MutatingChanged(false),
            ProviderEvent::MutationSettled {
                status: MutateStatus::Success
            },
        ]
    );
}

#[tokio::test]
async fn callback_panic_does_not_break_reconciliation() {
    let backend = Arc::new(MockBackend::new(rows(json!([]))));
    let cache = Arc::new(MemoryCache::for_table(
        backend.clone() as Arc<dyn optimistic_provider::backend::TableBackend>,
        "people",
        SelectParams::default(),
    ));

    let mut options = ProviderOptions::new(
        backend.clone() as Arc<dyn optimistic_provider::backend::TableBackend>,
        cache as Arc<dyn QueryCache>,
        "people",
    );
    options.on_mutate_success = Some(Arc::new(|_| panic!("listener bug")));
    let provider = Arc::new(Provider::new(options));

    let result = provider
        .mutate(insert_request(json!({"id": 1}), None))
        .await
        .unwrap();
    assert_eq!(result.status, MutateStatus::Success);
    assert!(!provider.is_mutating());
}

// ---------------------------------------------------------------------------
// RPC and flexible flows through the controller
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rpc_with_replace_data_prediction() {
    let h = harness(json!([{"id": 1}]), CountMode::None).await;

    let mut request = MutationRequest::new(MutationKind::Rpc);
    request.rpc_name = Some("rebuild".to_string());
    request.optimistic_data = Some(rows(json!([{"id": 10}, {"id": 11}])));

    let result = h.provider.mutate(request).await.unwrap();
    assert_eq!(result.status, MutateStatus::Success);
    assert_eq!(result.action, MutationKind::Rpc);
    // Bulk prediction input is echoed back untouched (no marking).
    let echoed = result.optimistic_data.unwrap();
    assert_eq!(echoed.as_array().unwrap().len(), 2);
    assert!(echoed[0].get("isOptimistic").is_none());
}

#[tokio::test]
async fn flexible_delete_against_the_provider_table() {
    let h = harness(json!([{"id": 1}, {"id": 2}]), CountMode::None).await;

    let mut request = MutationRequest::new(MutationKind::FlexibleMutation);
    request.flexible = Some(FlexibleMutationSettings {
        table_name: "people".to_string(),
        operation: FlexibleOperation::Delete,
        filters: vec![optimistic_provider::query::Filter::eq("id", json!(1))],
        optimistic_operation: Some("deleteRow".to_string()),
    });
    request.optimistic_row = Some(row(json!({"id": 1})));

    let result = h.provider.mutate(request).await.unwrap();
    assert_eq!(result.status, MutateStatus::Success);
    assert_eq!(h.backend.stored_rows().len(), 1);
    assert_eq!(h.cache.snapshot().unwrap().rows().len(), 1);
}
