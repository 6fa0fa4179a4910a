//! Optimistic operation selection — mapping a mutation kind and the
//! supplied prediction input to the transform that computes the prediction.
//!
//! Unrecognized operation literals fail at the string boundary, before any
//! network call; from there on dispatch is an exhaustive enum match.

use serde::{Deserialize, Serialize};

use super::transforms::{
    add_row, delete_row, edit_row, replace_data, return_unchanged, TransformContext,
};
use super::OptimisticInput;
use crate::error::{InvalidOptimisticOperationError, Result, ValidationError};
use crate::types::{MutationKind, ResultEnvelope};

// ============================================================================
// OptimisticOperation
// ============================================================================

/// The recognized optimistic operations. Absence of a prediction is modeled
/// as `Option::None`, not a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OptimisticOperation {
    AddRow,
    EditRow,
    DeleteRow,
    ReplaceData,
}

impl OptimisticOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimisticOperation::AddRow => "addRow",
            OptimisticOperation::EditRow => "editRow",
            OptimisticOperation::DeleteRow => "deleteRow",
            OptimisticOperation::ReplaceData => "replaceData",
        }
    }

    /// Parse a raw operation literal as supplied by the calling tool.
    ///
    /// Blank means "no optimistic operation". Any other unrecognized value
    /// is a configuration error whose message names both the offending value
    /// and the action it was supplied to.
    pub fn parse(value: Option<&str>, action_label: &str) -> Result<Option<Self>> {
        match value {
            None | Some("") => Ok(None),
            Some("addRow") => Ok(Some(OptimisticOperation::AddRow)),
            Some("editRow") => Ok(Some(OptimisticOperation::EditRow)),
            Some("deleteRow") => Ok(Some(OptimisticOperation::DeleteRow)),
            Some("replaceData") => Ok(Some(OptimisticOperation::ReplaceData)),
            Some(other) => Err(InvalidOptimisticOperationError {
                operation: other.to_string(),
                action: action_label.to_string(),
            }
            .into()),
        }
    }
}

/// Derive the operation from the mutation kind and the presence of
/// prediction input. An explicitly requested operation (flexible mutations)
/// wins over the kind-based default.
pub fn derive_operation(
    kind: MutationKind,
    has_input: bool,
    requested: Option<OptimisticOperation>,
) -> Option<OptimisticOperation> {
    if !has_input {
        return None;
    }
    match kind {
        MutationKind::Insert => Some(OptimisticOperation::AddRow),
        MutationKind::Update => Some(OptimisticOperation::EditRow),
        MutationKind::Delete => Some(OptimisticOperation::DeleteRow),
        MutationKind::Rpc => Some(OptimisticOperation::ReplaceData),
        MutationKind::FlexibleMutation => requested.or(Some(OptimisticOperation::ReplaceData)),
    }
}

// ============================================================================
// Transform dispatch
// ============================================================================

/// The selected transform, as a tagged variant — `Identity` when no
/// prediction was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Identity,
    AddRow,
    EditRow,
    DeleteRow,
    ReplaceData,
}

/// Map an operation (or its absence) to its transform.
pub fn select_transform(operation: Option<OptimisticOperation>) -> Transform {
    match operation {
        None => Transform::Identity,
        Some(OptimisticOperation::AddRow) => Transform::AddRow,
        Some(OptimisticOperation::EditRow) => Transform::EditRow,
        Some(OptimisticOperation::DeleteRow) => Transform::DeleteRow,
        Some(OptimisticOperation::ReplaceData) => Transform::ReplaceData,
    }
}

impl Transform {
    /// Apply this transform to the current envelope.
    ///
    /// The row-level transforms require `OptimisticInput::Row` and
    /// `ReplaceData` requires `OptimisticInput::Data`; the validation layer
    /// guarantees the pairing, so a mismatch here reports the setting that
    /// must have slipped through.
    pub fn apply(
        &self,
        current: Option<&ResultEnvelope>,
        input: &OptimisticInput,
        optimistic_count: Option<i64>,
        ctx: &TransformContext<'_>,
    ) -> Result<ResultEnvelope> {
        match (self, input) {
            (Transform::Identity, _) => Ok(return_unchanged(current)),
            (Transform::AddRow, OptimisticInput::Row(row)) => Ok(add_row(current, row, ctx)),
            (Transform::EditRow, OptimisticInput::Row(row)) => Ok(edit_row(current, row, ctx)),
            (Transform::DeleteRow, OptimisticInput::Row(row)) => delete_row(current, row, ctx),
            (Transform::ReplaceData, OptimisticInput::Data(rows)) => {
                Ok(replace_data(current, rows, optimistic_count))
            }
            (Transform::ReplaceData, _) => Err(ValidationError::new(
                "optimisticData",
                "a non-empty array of rows is required for the replaceData operation",
            )
            .into()),
            (_, _) => Err(ValidationError::new(
                "optimisticRow",
                "a single row object is required for row-level optimistic operations",
            )
            .into()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
