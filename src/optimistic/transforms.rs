//! The optimistic transform library — pure functions computing a predicted
//! result envelope from the current envelope and a proposed change.
//!
//! All transforms treat an absent envelope (or absent data) as an empty
//! collection, return fresh envelopes, and re-apply the active client-side
//! order so predicted rows land where the server-ordered rows would.

use serde_json::Value;

use crate::error::{InvalidOptimisticInputError, Result};
use crate::query::{order_rows, OrderBy};
use crate::types::{CountMode, ResultEnvelope, Row, Rows};

/// Configuration shared by the row-level transforms.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    pub order: &'a [OrderBy],
    pub count: CountMode,
    /// The caller-designated field used to match a row across predicted and
    /// real state.
    pub unique_identifier_field: &'a str,
}

fn current_rows(current: Option<&ResultEnvelope>) -> Rows {
    current
        .and_then(|envelope| envelope.data.clone())
        .unwrap_or_default()
}

fn current_count(current: Option<&ResultEnvelope>) -> Option<i64> {
    current.and_then(|envelope| envelope.count)
}

/// Identity — no prediction requested. Returns the current envelope
/// unchanged, or the empty envelope when there is none.
pub fn return_unchanged(current: Option<&ResultEnvelope>) -> ResultEnvelope {
    current.cloned().unwrap_or_else(ResultEnvelope::empty)
}

/// Append the (marked) optimistic row, re-apply ordering, and bump the count
/// when counting is enabled.
pub fn add_row(current: Option<&ResultEnvelope>, row: &Row, ctx: &TransformContext<'_>) -> ResultEnvelope {
    let mut rows = current_rows(current);
    rows.push(row.clone());

    ResultEnvelope {
        data: Some(order_rows(rows, ctx.order)),
        count: ctx
            .count
            .is_enabled()
            .then(|| current_count(current).unwrap_or(0) + 1),
    }
}

/// Replace the row whose unique-identifier value matches the optimistic
/// row's, re-apply ordering. Count unchanged.
pub fn edit_row(current: Option<&ResultEnvelope>, row: &Row, ctx: &TransformContext<'_>) -> ResultEnvelope {
    let key = row.get(ctx.unique_identifier_field);
    let rows: Rows = current_rows(current)
        .into_iter()
        .map(|existing| {
            if key.is_some() && existing.get(ctx.unique_identifier_field) == key {
                row.clone()
            } else {
                existing
            }
        })
        .collect();

    ResultEnvelope {
        data: Some(order_rows(rows, ctx.order)),
        count: current_count(current),
    }
}

/// Remove any row whose unique-identifier value matches the proposed row's,
/// re-apply ordering, and decrement the count when counting is enabled.
///
/// Fails when the proposed row's identifier value is not a string or number
/// — such a value cannot match anything and the prediction would silently do
/// nothing.
pub fn delete_row(
    current: Option<&ResultEnvelope>,
    row: &Row,
    ctx: &TransformContext<'_>,
) -> Result<ResultEnvelope> {
    let key = match row.get(ctx.unique_identifier_field) {
        Some(value @ (Value::String(_) | Value::Number(_))) => value.clone(),
        other => {
            return Err(InvalidOptimisticInputError {
                field: ctx.unique_identifier_field.to_string(),
                received: describe_value(other),
            }
            .into())
        }
    };

    let rows: Rows = current_rows(current)
        .into_iter()
        .filter(|existing| existing.get(ctx.unique_identifier_field) != Some(&key))
        .collect();

    Ok(ResultEnvelope {
        data: Some(order_rows(rows, ctx.order)),
        count: ctx
            .count
            .is_enabled()
            .then(|| (current_count(current).unwrap_or(0) - 1).max(0)),
    })
}

/// Substitute the entire data (and, when supplied, count) with the
/// caller-provided values, bypassing row-level merge logic entirely. The
/// caller is assumed to know the full resulting shape, so no reordering.
pub fn replace_data(
    current: Option<&ResultEnvelope>,
    rows: &Rows,
    count: Option<i64>,
) -> ResultEnvelope {
    ResultEnvelope {
        data: Some(rows.clone()),
        count: count.or_else(|| current_count(current)),
    }
}

fn describe_value(value: Option<&Value>) -> String {
    match value {
        None => "nothing".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(_)) => "a boolean".to_string(),
        Some(Value::Array(_)) => "an array".to_string(),
        Some(Value::Object(_)) => "an object".to_string(),
        Some(Value::String(_)) | Some(Value::Number(_)) => unreachable!(),
    }
}

// ============================================================================
// Tests
// ============================================================================
