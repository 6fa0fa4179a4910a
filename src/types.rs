use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::Error;
use crate::query::Filter;

/// A single record — an open mapping from field name to JSON value.
/// No fixed schema; uniqueness is enforced only by the caller-designated
/// unique-identifier field (commonly `id`).
pub type Row = Map<String, Value>;

/// An ordered sequence of rows, in server order unless reordered client-side.
pub type Rows = Vec<Row>;

/// Field injected onto a predicted row: a fresh token, never reused,
/// generated once per mutation attempt. CamelCase because marked rows are a
/// data contract read by UI consumers.
pub const OPTIMISTIC_ID_FIELD: &str = "optimisticId";

/// Field injected onto a predicted row so consumers can tell predicted rows
/// from confirmed rows before the real result arrives.
pub const IS_OPTIMISTIC_FIELD: &str = "isOptimistic";

/// Copy `row` and stamp it with the optimistic marker fields.
pub fn mark_optimistic(row: &Row) -> Row {
    let mut marked = row.clone();
    marked.insert(
        OPTIMISTIC_ID_FIELD.to_string(),
        Value::String(Uuid::new_v4().to_string()),
    );
    marked.insert(IS_OPTIMISTIC_FIELD.to_string(), Value::Bool(true));
    marked
}

/// True if `row` carries the optimistic marker.
pub fn is_optimistic(row: &Row) -> bool {
    matches!(row.get(IS_OPTIMISTIC_FIELD), Some(Value::Bool(true)))
}

// ============================================================================
// Result envelope
// ============================================================================

/// The uniform `{data, count}` shape returned by every fetch and mutation.
///
/// `count` is `None` unless the caller opted into a counting mode; absent
/// values are always `None`, never an out-of-band sentinel, so downstream
/// consumers get a stable shape regardless of code path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub data: Option<Rows>,
    pub count: Option<i64>,
}

impl ResultEnvelope {
    pub fn empty() -> Self {
        Self {
            data: None,
            count: None,
        }
    }

    pub fn new(data: Option<Rows>, count: Option<i64>) -> Self {
        Self { data, count }
    }

    /// The rows, treating absent data as an empty sequence.
    pub fn rows(&self) -> &[Row] {
        self.data.as_deref().unwrap_or(&[])
    }
}

// ============================================================================
// Operation kinds
// ============================================================================

/// The five mutation shapes the engine can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
    Rpc,
    FlexibleMutation,
}

/// Sub-operation of a flexible mutation, run against a possibly different
/// table than the provider's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlexibleOperation {
    Insert,
    Update,
    Upsert,
    Delete,
}

impl FlexibleOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlexibleOperation::Insert => "insert",
            FlexibleOperation::Update => "update",
            FlexibleOperation::Upsert => "upsert",
            FlexibleOperation::Delete => "delete",
        }
    }
}

/// What was being attempted when an error was produced — the mutation kinds
/// plus the read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionAttempted {
    Select,
    Insert,
    Update,
    Delete,
    Rpc,
    FlexibleMutation,
}

impl From<MutationKind> for ActionAttempted {
    fn from(kind: MutationKind) -> Self {
        match kind {
            MutationKind::Insert => ActionAttempted::Insert,
            MutationKind::Update => ActionAttempted::Update,
            MutationKind::Delete => ActionAttempted::Delete,
            MutationKind::Rpc => ActionAttempted::Rpc,
            MutationKind::FlexibleMutation => ActionAttempted::FlexibleMutation,
        }
    }
}

/// Counting mode for fetches and count-aware optimistic arithmetic.
/// Any mode but `None` means counting is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountMode {
    #[default]
    None,
    Exact,
    Planned,
    Estimated,
}

impl CountMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, CountMode::None)
    }
}

// ============================================================================
// Mutation payload
// ============================================================================

/// The change submitted to the backend, as an explicit union — a single row,
/// a batch of rows (flexible insert only), or nothing. Constructed by the
/// caller, so the engine never shape-sniffs.
#[derive(Debug, Clone, Default)]
pub enum MutationPayload {
    Single(Row),
    Bulk(Rows),
    #[default]
    None,
}

impl MutationPayload {
    pub fn is_none(&self) -> bool {
        matches!(self, MutationPayload::None)
    }

    pub fn as_single(&self) -> Option<&Row> {
        match self {
            MutationPayload::Single(row) => Some(row),
            _ => None,
        }
    }

    /// The payload as a JSON value for result/error envelopes.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            MutationPayload::Single(row) => Some(Value::Object(row.clone())),
            MutationPayload::Bulk(rows) => Some(Value::Array(
                rows.iter().cloned().map(Value::Object).collect(),
            )),
            MutationPayload::None => None,
        }
    }
}

// ============================================================================
// Mutation request
// ============================================================================

/// Settings for a flexible mutation: an explicitly named table, operation,
/// and filter set, decoupled from the provider's default collection.
///
/// `optimistic_operation` is kept as the raw literal supplied by the calling
/// tool; it is parsed at the boundary and an unrecognized value fails with
/// `InvalidOptimisticOperationError` before any network call.
#[derive(Debug, Clone)]
pub struct FlexibleMutationSettings {
    pub table_name: String,
    pub operation: FlexibleOperation,
    pub filters: Vec<Filter>,
    pub optimistic_operation: Option<String>,
}

/// One mutation invocation.
///
/// `optimistic_row` and `optimistic_data` are mutually exclusive; supplying
/// both is a configuration error raised before anything else happens.
#[derive(Debug, Clone)]
pub struct MutationRequest {
    pub kind: MutationKind,
    pub payload: MutationPayload,
    /// Ask the executor to read the mutated row(s) back after the mutation.
    pub should_return_row: bool,
    /// Resolve the call with a `Pending` result while the real mutation
    /// continues in the background.
    pub return_immediately: bool,
    /// Single-row optimistic prediction input (marked before use).
    pub optimistic_row: Option<Row>,
    /// Whole-collection optimistic prediction input (rpc / flexible).
    pub optimistic_data: Option<Rows>,
    pub optimistic_count: Option<i64>,
    /// Remote procedure name — required when `kind` is `Rpc`.
    pub rpc_name: Option<String>,
    /// Required when `kind` is `FlexibleMutation`.
    pub flexible: Option<FlexibleMutationSettings>,
    /// Opaque caller data echoed on results and errors.
    pub custom_metadata: Option<Value>,
}

impl MutationRequest {
    pub fn new(kind: MutationKind) -> Self {
        Self {
            kind,
            payload: MutationPayload::None,
            should_return_row: false,
            return_immediately: false,
            optimistic_row: None,
            optimistic_data: None,
            optimistic_count: None,
            rpc_name: None,
            flexible: None,
            custom_metadata: None,
        }
    }
}

// ============================================================================
// Mutate result & provider error envelopes
// ============================================================================

/// Lifecycle status of a mutation result. Exactly one terminal status
/// (`Success` or `Error`) is delivered per invocation; `Pending` is an
/// optional, strictly earlier, non-terminal emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutateStatus {
    Pending,
    Success,
    Error,
}

/// The uniform result delivered for every mutation, regardless of kind.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutateResult {
    pub data: Option<Rows>,
    pub count: Option<i64>,
    /// The prediction input that was used — the marked optimistic row
    /// (object) or the bulk optimistic rows (array).
    pub optimistic_data: Option<Value>,
    pub optimistic_count: Option<i64>,
    /// The change that was submitted to the backend.
    pub payload: Option<Value>,
    pub action: MutationKind,
    pub summary: String,
    pub status: MutateStatus,
    /// Non-null iff `status` is `Error`.
    pub error: Option<ProviderError>,
    pub custom_metadata: Option<Value>,
}

/// The error envelope delivered through callbacks and error results —
/// a stable, human-readable shape UI layers can show without inspecting raw
/// backend exceptions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderError {
    /// Unique per error occurrence.
    pub error_id: String,
    pub summary: String,
    pub error_message: String,
    pub action_attempted: ActionAttempted,
    pub payload: Option<Value>,
    pub optimistic_data: Option<Value>,
    pub custom_metadata: Option<Value>,
}

impl ProviderError {
    pub fn from_error(
        error: &Error,
        action_attempted: ActionAttempted,
        summary: impl Into<String>,
        payload: Option<Value>,
        optimistic_data: Option<Value>,
        custom_metadata: Option<Value>,
    ) -> Self {
        Self {
            error_id: Uuid::new_v4().to_string(),
            summary: summary.into(),
            error_message: error.to_string(),
            action_attempted,
            payload,
            optimistic_data,
            custom_metadata,
        }
    }
}

// ============================================================================
// Callback aliases
// ============================================================================

/// Success callback, invoked at most once per mutation attempt.
pub type MutateResultCallback = dyn Fn(&MutateResult) + Send + Sync;

/// Error callback, invoked at most once per mutation attempt.
pub type ProviderErrorCallback = dyn Fn(&ProviderError) + Send + Sync;

// ============================================================================
// Tests
// ============================================================================
