//! Remote collection backend — the user-provided network seam.
//!
//! Implementations handle communication with the remote table store (HTTP,
//! SDK client, etc.). Every call returns the `{data, count, error}` triple;
//! backend-reported failures travel in `error`, never as a Rust `Err`, so
//! the mutation executor owns the detect-and-surface step.

pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{RemoteOperationError, Result};
use crate::query::{Filter, SelectParams};
use crate::types::{ResultEnvelope, Row, Rows};

pub use memory::MemoryBackend;

// ============================================================================
// Response types
// ============================================================================

/// Backend-reported failure.
#[derive(Debug, Clone)]
pub struct BackendError {
    pub message: String,
    pub code: Option<String>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }
}

/// The `{data, count, error}` triple returned by every backend call.
#[derive(Debug, Clone, Default)]
pub struct BackendResponse {
    pub data: Option<Value>,
    pub count: Option<i64>,
    pub error: Option<BackendError>,
}

impl BackendResponse {
    pub fn ok(data: Option<Value>, count: Option<i64>) -> Self {
        Self {
            data,
            count,
            error: None,
        }
    }

    pub fn err(error: BackendError) -> Self {
        Self {
            data: None,
            count: None,
            error: Some(error),
        }
    }

    /// Normalize into the uniform result envelope, surfacing a reported
    /// failure as `RemoteOperationError`.
    ///
    /// Data shapes: an array keeps its object elements as rows, a lone
    /// object becomes a one-row collection, anything else (rpc scalars and
    /// the like) yields no row data. Count passes through unchanged.
    pub fn into_envelope(self) -> Result<ResultEnvelope> {
        if let Some(error) = self.error {
            return Err(RemoteOperationError {
                message: error.message,
                code: error.code,
            }
            .into());
        }

        let data: Option<Rows> = match self.data {
            Some(Value::Array(items)) => Some(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(row) => Some(row),
                        _ => None,
                    })
                    .collect(),
            ),
            Some(Value::Object(row)) => Some(vec![row]),
            Some(_) | None => None,
        };

        Ok(ResultEnvelope::new(data, self.count))
    }
}

// ============================================================================
// TableBackend trait
// ============================================================================

/// The remote collection backend, at its interface boundary.
#[async_trait]
pub trait TableBackend: Send + Sync {
    /// Read rows, honoring filters, order, pagination, and count mode.
    async fn select(&self, table: &str, params: &SelectParams) -> BackendResponse;

    /// Insert one or more rows.
    async fn insert(&self, table: &str, rows: &[Row]) -> BackendResponse;

    /// Update rows matching `filters` with the fields of `row`.
    async fn update(&self, table: &str, row: &Row, filters: &[Filter]) -> BackendResponse;

    /// Update rows matching `filters`, inserting `row` when nothing matches.
    async fn upsert(&self, table: &str, row: &Row, filters: &[Filter]) -> BackendResponse;

    /// Delete rows matching `filters`.
    async fn delete(&self, table: &str, filters: &[Filter]) -> BackendResponse;

    /// Invoke a remote procedure. The response data may be any JSON shape.
    async fn rpc(&self, name: &str, args: &Value) -> BackendResponse;
}

// ============================================================================
// Tests
// ============================================================================
