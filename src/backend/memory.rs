//! In-memory reference backend.
//!
//! A table store resolving filters, ordering, pagination, and count modes
//! locally. Used by tests and demos; doubles as the executable description
//! of what a real backend implementation is expected to do.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{BackendError, BackendResponse, TableBackend};
use crate::query::{order_rows, Filter, SelectParams};
use crate::types::{Row, Rows};

/// Handler for a registered remote procedure.
pub type RpcHandler = dyn Fn(&Value) -> BackendResponse + Send + Sync;

pub struct MemoryBackend {
    tables: Mutex<HashMap<String, Rows>>,
    rpc_handlers: Mutex<HashMap<String, Arc<RpcHandler>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            rpc_handlers: Mutex::new(HashMap::new()),
        }
    }

    /// Seed a table with rows, replacing any existing contents.
    pub fn with_table(self, name: impl Into<String>, rows: Rows) -> Self {
        self.tables.lock().insert(name.into(), rows);
        self
    }

    /// Register a handler for a remote procedure name.
    pub fn register_rpc(
        &self,
        name: impl Into<String>,
        handler: impl Fn(&Value) -> BackendResponse + Send + Sync + 'static,
    ) {
        self.rpc_handlers.lock().insert(name.into(), Arc::new(handler));
    }

    /// Current contents of a table (test inspection).
    pub fn table_rows(&self, name: &str) -> Rows {
        self.tables.lock().get(name).cloned().unwrap_or_default()
    }

    fn rows_as_value(rows: &[Row]) -> Value {
        Value::Array(rows.iter().cloned().map(Value::Object).collect())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TableBackend for MemoryBackend {
    async fn select(&self, table: &str, params: &SelectParams) -> BackendResponse {
        let tables = self.tables.lock();
        let Some(rows) = tables.get(table) else {
            return BackendResponse::err(BackendError::new(format!(
                "relation \"{table}\" does not exist"
            )));
        };

        let filtered: Rows = rows
            .iter()
            .filter(|row| params.filters.iter().all(|f| f.matches_row(row)))
            .cloned()
            .collect();

        let count = params.count.is_enabled().then_some(filtered.len() as i64);

        let ordered = order_rows(filtered, &params.order);

        let start = params.offset.unwrap_or(0).min(ordered.len());
        let end = match params.limit {
            Some(limit) => (start + limit).min(ordered.len()),
            None => ordered.len(),
        };
        let page = &ordered[start..end];

        BackendResponse::ok(Some(Self::rows_as_value(page)), count)
    }

    async fn insert(&self, table: &str, rows: &[Row]) -> BackendResponse {
        let mut tables = self.tables.lock();
        tables
            .entry(table.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        // Like a mutation without an attached select: no row data back.
        BackendResponse::ok(None, None)
    }

    async fn update(&self, table: &str, row: &Row, filters: &[Filter]) -> BackendResponse {
        let mut tables = self.tables.lock();
        let Some(stored) = tables.get_mut(table) else {
            return BackendResponse::err(BackendError::new(format!(
                "relation \"{table}\" does not exist"
            )));
        };

        for existing in stored.iter_mut() {
            if filters.iter().all(|f| f.matches_row(existing)) {
                for (key, value) in row {
                    existing.insert(key.clone(), value.clone());
                }
            }
        }
        BackendResponse::ok(None, None)
    }

    async fn upsert(&self, table: &str, row: &Row, filters: &[Filter]) -> BackendResponse {
        let matched = {
            let tables = self.tables.lock();
            tables
                .get(table)
                .map(|stored| {
                    stored
                        .iter()
                        .any(|existing| filters.iter().all(|f| f.matches_row(existing)))
                })
                .unwrap_or(false)
        };

        if matched && !filters.is_empty() {
            self.update(table, row, filters).await
        } else {
            self.insert(table, std::slice::from_ref(row)).await
        }
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> BackendResponse {
        let mut tables = self.tables.lock();
        let Some(stored) = tables.get_mut(table) else {
            return BackendResponse::err(BackendError::new(format!(
                "relation \"{table}\" does not exist"
            )));
        };

        stored.retain(|existing| !filters.iter().all(|f| f.matches_row(existing)));
        BackendResponse::ok(None, None)
    }

    async fn rpc(&self, name: &str, args: &Value) -> BackendResponse {
        let handler = self.rpc_handlers.lock().get(name).cloned();
        match handler {
            Some(handler) => handler(args),
            None => BackendResponse::err(BackendError::new(format!(
                "function \"{name}\" does not exist"
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
