//! Transform library properties: append/replace/remove/replace-all over the
//! result envelope, count symmetry, and the null-data edge cases.

use optimistic_provider::error::Error;
use optimistic_provider::optimistic::{
    add_row, delete_row, edit_row, replace_data, return_unchanged, TransformContext,
};
use optimistic_provider::query::OrderBy;
use optimistic_provider::types::{
    is_optimistic, mark_optimistic, CountMode, ResultEnvelope, Row, Rows, IS_OPTIMISTIC_FIELD,
    OPTIMISTIC_ID_FIELD,
};
use serde_json::{json, Value};

fn rows(value: Value) -> Rows {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect()
}

fn row(value: Value) -> Row {
    value.as_object().unwrap().clone()
}

fn ctx(count: CountMode) -> TransformContext<'static> {
    TransformContext {
        order: &[],
        count,
        unique_identifier_field: "id",
    }
}

// ---------------------------------------------------------------------------
// Append
// ---------------------------------------------------------------------------

#[test]
fn append_grows_by_one_and_contains_the_row_exactly_once() {
    let envelope = ResultEnvelope::new(Some(rows(json!([{"id": 1}, {"id": 2}]))), None);
    let marked = mark_optimistic(&row(json!({"id": 3})));

    let result = add_row(Some(&envelope), &marked, &ctx(CountMode::None));

    assert_eq!(result.rows().len(), envelope.rows().len() + 1);
    let occurrences = result.rows().iter().filter(|r| **r == marked).count();
    assert_eq!(occurrences, 1);
}

#[test]
fn append_count_is_null_when_counting_disabled() {
    let envelope = ResultEnvelope::new(Some(rows(json!([{"id": 1}]))), None);
    let result = add_row(Some(&envelope), &row(json!({"id": 2})), &ctx(CountMode::None));
    assert_eq!(result.count, None);
}

#[test]
fn append_count_increments_when_counting_enabled() {
    let envelope = ResultEnvelope::new(Some(rows(json!([{"id": 1}]))), Some(1));
    let result = add_row(Some(&envelope), &row(json!({"id": 2})), &ctx(CountMode::Exact));
    assert_eq!(result.count, Some(2));

    // Absent current count is treated as zero.
    let uncounted = ResultEnvelope::new(Some(rows(json!([{"id": 1}]))), None);
    let result = add_row(Some(&uncounted), &row(json!({"id": 2})), &ctx(CountMode::Exact));
    assert_eq!(result.count, Some(1));
}

#[test]
fn append_to_empty_envelope_never_panics() {
    let result = add_row(None, &row(json!({"id": 1})), &ctx(CountMode::Exact));
    assert_eq!(result.rows().len(), 1);
    assert_eq!(result.count, Some(1));
}

// ---------------------------------------------------------------------------
// Round trip
// ---------------------------------------------------------------------------

#[test]
fn add_then_remove_restores_the_original_set() {
    let original = ResultEnvelope::new(Some(rows(json!([{"id": 1}, {"id": 2}]))), Some(2));
    let added_row = row(json!({"id": 99}));

    let appended = add_row(Some(&original), &added_row, &ctx(CountMode::Exact));
    let restored = delete_row(Some(&appended), &added_row, &ctx(CountMode::Exact)).unwrap();

    let mut original_ids: Vec<i64> = original.rows().iter().map(|r| r["id"].as_i64().unwrap()).collect();
    let mut restored_ids: Vec<i64> = restored.rows().iter().map(|r| r["id"].as_i64().unwrap()).collect();
    original_ids.sort_unstable();
    restored_ids.sort_unstable();
    assert_eq!(original_ids, restored_ids);
    assert_eq!(restored.count, original.count);
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[test]
fn identity_preserves_the_envelope_and_defaults_to_empty() {
    let envelope = ResultEnvelope::new(Some(rows(json!([{"id": 1}]))), Some(1));
    assert_eq!(return_unchanged(Some(&envelope)), envelope);
    assert_eq!(
        return_unchanged(None),
        ResultEnvelope::new(None, None)
    );
}

// ---------------------------------------------------------------------------
// Scenario: optimistic insert with counting enabled
// ---------------------------------------------------------------------------

#[test]
fn optimistic_insert_scenario() {
    // Current envelope {data: [{id: 1, name: "Bob"}], count: 1}, optimistic
    // row {name: "Alice"} → predicted data gains the marked Alice row and
    // count becomes 2.
    let envelope = ResultEnvelope::new(Some(rows(json!([{"id": 1, "name": "Bob"}]))), Some(1));
    let marked = mark_optimistic(&row(json!({"name": "Alice"})));

    let result = add_row(Some(&envelope), &marked, &ctx(CountMode::Exact));

    assert_eq!(result.count, Some(2));
    assert_eq!(result.rows().len(), 2);
    assert_eq!(result.rows()[0]["name"], json!("Bob"));

    let alice = &result.rows()[1];
    assert_eq!(alice["name"], json!("Alice"));
    assert!(alice[OPTIMISTIC_ID_FIELD].is_string());
    assert_eq!(alice[IS_OPTIMISTIC_FIELD], json!(true));
    assert!(is_optimistic(alice));
}

// ---------------------------------------------------------------------------
// Scenario: optimistic delete by key
// ---------------------------------------------------------------------------

#[test]
fn optimistic_delete_scenario() {
    let envelope = ResultEnvelope::new(Some(rows(json!([{"id": 5}, {"id": 6}]))), None);

    let result =
        delete_row(Some(&envelope), &row(json!({"id": 5})), &ctx(CountMode::None)).unwrap();
    assert_eq!(result.rows().len(), 1);
    assert_eq!(result.rows()[0]["id"], json!(6));

    // A non-primitive identifier value cannot drive the prediction.
    let err = delete_row(
        Some(&envelope),
        &row(json!({"id": {"nested": true}})),
        &ctx(CountMode::None),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidOptimisticInput(_)));
}

// ---------------------------------------------------------------------------
// Edit & replace
// ---------------------------------------------------------------------------

#[test]
fn edit_row_matches_string_keys_too() {
    let envelope = ResultEnvelope::new(
        Some(rows(json!([{"id": "a", "v": 1}, {"id": "b", "v": 2}]))),
        Some(2),
    );
    let result = edit_row(
        Some(&envelope),
        &row(json!({"id": "b", "v": 20})),
        &ctx(CountMode::Exact),
    );
    assert_eq!(result.rows()[1]["v"], json!(20));
    assert_eq!(result.count, Some(2));
}

#[test]
fn replace_data_bypasses_row_merge() {
    let envelope = ResultEnvelope::new(Some(rows(json!([{"id": 1}]))), Some(1));
    let replacement = rows(json!([{"id": 10}, {"id": 11}, {"id": 12}]));

    let result = replace_data(Some(&envelope), &replacement, Some(3));
    assert_eq!(result.rows().len(), 3);
    assert_eq!(result.count, Some(3));
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[test]
fn row_level_transforms_reapply_the_active_order() {
    let order = [OrderBy::desc("id")];
    let ctx = TransformContext {
        order: &order,
        count: CountMode::None,
        unique_identifier_field: "id",
    };
    let envelope = ResultEnvelope::new(Some(rows(json!([{"id": 3}, {"id": 1}]))), None);

    let result = add_row(Some(&envelope), &row(json!({"id": 2})), &ctx);
    let ids: Vec<i64> = result.rows().iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![3, 2, 1]);
}
