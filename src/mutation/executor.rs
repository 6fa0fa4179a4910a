//! Mutation executor — issues one of the five mutation kinds against the
//! remote collection and normalizes the heterogeneous backend response into
//! the common result envelope.
//!
//! Backend-reported failures surface as `RemoteOperationError`; shape
//! problems the validation layer cannot see (a missing unique-identifier
//! value, chiefly) surface as `ValidationError` before any network call.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::backend::TableBackend;
use crate::error::{RemoteOperationError, Result, ValidationError};
use crate::query::{Filter, SelectParams};
use crate::types::{
    FlexibleMutationSettings, FlexibleOperation, MutationKind, MutationRequest, ResultEnvelope,
    Row,
};

/// Configuration for `MutationExecutor`.
pub struct ExecutorOptions {
    pub backend: Arc<dyn TableBackend>,
    /// The provider's default table.
    pub table_name: String,
    /// Field used to target standard update/delete mutations.
    pub unique_identifier_field: String,
    /// Test knob: 1s artificial latency before the backend call.
    pub add_delay_for_testing: bool,
    /// Test knob: fail randomly (p > 0.5) before the backend call.
    pub simulate_random_mutation_errors: bool,
}

pub struct MutationExecutor {
    backend: Arc<dyn TableBackend>,
    table_name: String,
    unique_identifier_field: String,
    add_delay_for_testing: bool,
    simulate_random_mutation_errors: bool,
}

impl MutationExecutor {
    pub fn new(options: ExecutorOptions) -> Self {
        Self {
            backend: options.backend,
            table_name: options.table_name,
            unique_identifier_field: options.unique_identifier_field,
            add_delay_for_testing: options.add_delay_for_testing,
            simulate_random_mutation_errors: options.simulate_random_mutation_errors,
        }
    }

    /// Issue the mutation described by `request` and normalize the response.
    pub async fn execute(&self, request: &MutationRequest) -> Result<ResultEnvelope> {
        self.apply_test_knobs().await?;

        debug!(kind = ?request.kind, table = %self.table_name, "executing mutation");

        match request.kind {
            MutationKind::Insert => self.insert(request).await,
            MutationKind::Update => self.update(request).await,
            MutationKind::Delete => self.delete(request).await,
            MutationKind::Rpc => self.rpc(request).await,
            MutationKind::FlexibleMutation => self.flexible(request).await,
        }
    }

    // -----------------------------------------------------------------------
    // Standard mutations
    // -----------------------------------------------------------------------

    async fn insert(&self, request: &MutationRequest) -> Result<ResultEnvelope> {
        let row = self.require_single(request, "insert")?;

        let response = self
            .backend
            .insert(&self.table_name, std::slice::from_ref(row))
            .await;
        let envelope = response.into_envelope()?;

        if request.should_return_row && envelope.data.is_none() {
            // An insert may carry a server-generated key; without an
            // identifier value there is nothing to read back by.
            if let Some(key) = self.identifier_value(row) {
                return self.read_back(&self.table_name, vec![self.key_filter(key)]).await;
            }
        }
        Ok(envelope)
    }

    async fn update(&self, request: &MutationRequest) -> Result<ResultEnvelope> {
        let row = self.require_single(request, "update")?;
        let key = self.require_identifier(row)?;
        let filters = vec![self.key_filter(key)];

        let response = self.backend.update(&self.table_name, row, &filters).await;
        let envelope = response.into_envelope()?;

        if request.should_return_row && envelope.data.is_none() {
            return self.read_back(&self.table_name, filters).await;
        }
        Ok(envelope)
    }

    async fn delete(&self, request: &MutationRequest) -> Result<ResultEnvelope> {
        let row = self.require_single(request, "delete")?;
        let key = self.require_identifier(row)?;
        let filters = vec![self.key_filter(key)];

        // No read-back after a delete — a follow-up select cannot observe
        // the removed rows. Whatever the backend returned is the result.
        self.backend
            .delete(&self.table_name, &filters)
            .await
            .into_envelope()
    }

    // -----------------------------------------------------------------------
    // RPC
    // -----------------------------------------------------------------------

    async fn rpc(&self, request: &MutationRequest) -> Result<ResultEnvelope> {
        let name = request
            .rpc_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ValidationError::new("rpcName", "a remote procedure name is required"))?;

        let args = request.payload.to_value().unwrap_or(Value::Null);
        self.backend.rpc(name, &args).await.into_envelope()
    }

    // -----------------------------------------------------------------------
    // Flexible mutation
    // -----------------------------------------------------------------------

    async fn flexible(&self, request: &MutationRequest) -> Result<ResultEnvelope> {
        let settings = request.flexible.as_ref().ok_or_else(|| {
            ValidationError::new(
                "flexibleMutationSettings",
                "settings are required for a flexible mutation",
            )
        })?;

        let response = match settings.operation {
            FlexibleOperation::Insert => {
                let rows = self.flexible_insert_rows(request)?;
                self.backend.insert(&settings.table_name, &rows).await
            }
            FlexibleOperation::Update => {
                let row = self.flexible_single(request, settings)?;
                self.backend
                    .update(&settings.table_name, row, &settings.filters)
                    .await
            }
            FlexibleOperation::Upsert => {
                let row = self.flexible_single(request, settings)?;
                self.backend
                    .upsert(&settings.table_name, row, &settings.filters)
                    .await
            }
            FlexibleOperation::Delete => {
                self.require_filters(settings)?;
                self.backend
                    .delete(&settings.table_name, &settings.filters)
                    .await
            }
        };
        let envelope = response.into_envelope()?;

        // No read-back after a delete, and none possible without filters.
        let deleting = settings.operation == FlexibleOperation::Delete;
        if request.should_return_row
            && envelope.data.is_none()
            && !deleting
            && !settings.filters.is_empty()
        {
            return self.read_back(&settings.table_name, settings.filters.clone()).await;
        }
        Ok(envelope)
    }

    fn flexible_insert_rows(&self, request: &MutationRequest) -> Result<Vec<Row>> {
        match &request.payload {
            crate::types::MutationPayload::Single(row) => Ok(vec![row.clone()]),
            crate::types::MutationPayload::Bulk(rows) if !rows.is_empty() => Ok(rows.clone()),
            _ => Err(ValidationError::new(
                "payload",
                "a row object or a non-empty array of rows is required for the insert operation",
            )
            .into()),
        }
    }

    fn flexible_single<'a>(
        &self,
        request: &'a MutationRequest,
        settings: &FlexibleMutationSettings,
    ) -> Result<&'a Row> {
        self.require_filters(settings)?;
        request.payload.as_single().ok_or_else(|| {
            ValidationError::new(
                "payload",
                format!(
                    "a single row object is required for the {} operation",
                    settings.operation.as_str()
                ),
            )
            .into()
        })
    }

    fn require_filters(&self, settings: &FlexibleMutationSettings) -> Result<()> {
        if settings.filters.is_empty() {
            return Err(ValidationError::new(
                "filters",
                format!(
                    "at least one filter is required for the {} operation",
                    settings.operation.as_str()
                ),
            )
            .into());
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn require_single<'a>(&self, request: &'a MutationRequest, operation: &str) -> Result<&'a Row> {
        request.payload.as_single().ok_or_else(|| {
            ValidationError::new(
                "payload",
                format!("a single row object is required for the {operation} operation"),
            )
            .into()
        })
    }

    /// The payload's unique-identifier value, when it is a usable key.
    fn identifier_value(&self, row: &Row) -> Option<Value> {
        match row.get(&self.unique_identifier_field) {
            Some(value @ (Value::String(_) | Value::Number(_))) => Some(value.clone()),
            _ => None,
        }
    }

    fn require_identifier(&self, row: &Row) -> Result<Value> {
        self.identifier_value(row).ok_or_else(|| {
            ValidationError::new(
                self.unique_identifier_field.clone(),
                "the row must carry a string or number unique-identifier value \
                 so the target row can be resolved",
            )
            .into()
        })
    }

    fn key_filter(&self, key: Value) -> Filter {
        Filter::eq(self.unique_identifier_field.clone(), key)
    }

    async fn read_back(&self, table: &str, filters: Vec<Filter>) -> Result<ResultEnvelope> {
        let params = SelectParams {
            filters,
            ..SelectParams::default()
        };
        self.backend.select(table, &params).await.into_envelope()
    }

    /// Injected latency and random failure — exercised only by tests of the
    /// reconciliation error path; no effect on selection or transforms.
    async fn apply_test_knobs(&self) -> Result<()> {
        if self.add_delay_for_testing {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        if self.simulate_random_mutation_errors && rand::random::<f64>() > 0.5 {
            return Err(RemoteOperationError::new("Simulated random mutation error").into());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
