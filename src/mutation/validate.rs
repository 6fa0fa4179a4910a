//! Pre-flight validation — synchronous, side-effect-free checks on the
//! combined mutation settings. Any violation fails fast with a
//! `ValidationError` naming the offending field; no network call is
//! attempted.

use crate::error::{Result, ValidationError};
use crate::optimistic::OptimisticOperation;
use crate::types::{
    FlexibleMutationSettings, FlexibleOperation, MutationKind, MutationPayload, MutationRequest,
    Row, Rows,
};

/// Validate a mutation request end to end.
///
/// `flexible_optimistic_operation` is the already-parsed operation literal
/// from the flexible settings (parsing happens first so its error carries
/// the action label).
pub fn validate_mutation_request(
    request: &MutationRequest,
    flexible_optimistic_operation: Option<OptimisticOperation>,
) -> Result<()> {
    // Only one optimistic input is valid at a time.
    if request.optimistic_row.is_some() && request.optimistic_data.is_some() {
        return Err(ValidationError::new(
            "optimisticRow",
            "only one of optimisticRow or optimisticData may be supplied, not both",
        )
        .into());
    }

    match request.kind {
        MutationKind::Insert | MutationKind::Update | MutationKind::Delete => {
            if request.payload.as_single().is_none() {
                return Err(ValidationError::new(
                    "payload",
                    format!(
                        "a single row object is required for the {} operation",
                        kind_name(request.kind)
                    ),
                )
                .into());
            }
        }
        MutationKind::Rpc => {
            if request.rpc_name.as_deref().map_or(true, |name| name.trim().is_empty()) {
                return Err(
                    ValidationError::new("rpcName", "a remote procedure name is required").into(),
                );
            }
            // An rpc prediction replaces the whole collection; a single
            // optimistic row cannot describe that.
            if request.optimistic_row.is_some() {
                return Err(ValidationError::new(
                    "optimisticRow",
                    "rpc mutations take optimisticData (the full predicted collection), \
                     not optimisticRow",
                )
                .into());
            }
        }
        MutationKind::FlexibleMutation => {
            let Some(settings) = &request.flexible else {
                return Err(ValidationError::new(
                    "flexibleMutationSettings",
                    "settings are required for a flexible mutation",
                )
                .into());
            };
            validate_flexible_settings(settings, &request.payload)?;
            validate_optimistic_settings(
                flexible_optimistic_operation,
                request.optimistic_row.as_ref(),
                request.optimistic_data.as_ref(),
            )?;
        }
    }

    Ok(())
}

/// Validate the flexible-mutation settings against the submitted payload.
pub fn validate_flexible_settings(
    settings: &FlexibleMutationSettings,
    payload: &MutationPayload,
) -> Result<()> {
    if settings.table_name.trim().is_empty() {
        return Err(
            ValidationError::new("tableName", "must be a non-empty string").into(),
        );
    }

    match settings.operation {
        FlexibleOperation::Insert => match payload {
            MutationPayload::Single(_) => {}
            MutationPayload::Bulk(rows) if !rows.is_empty() => {}
            _ => {
                return Err(ValidationError::new(
                    "payload",
                    "a row object or a non-empty array of rows is required for the insert operation",
                )
                .into())
            }
        },
        FlexibleOperation::Update | FlexibleOperation::Upsert => {
            if payload.as_single().is_none() {
                return Err(ValidationError::new(
                    "payload",
                    format!(
                        "a single row object is required for the {} operation",
                        settings.operation.as_str()
                    ),
                )
                .into());
            }
        }
        FlexibleOperation::Delete => {}
    }

    if matches!(
        settings.operation,
        FlexibleOperation::Update | FlexibleOperation::Upsert | FlexibleOperation::Delete
    ) && settings.filters.is_empty()
    {
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

/// Validate that the optimistic payload shape matches the chosen optimistic
/// operation: a single row for the row-level operations, a non-empty array
/// for replaceData.
pub fn validate_optimistic_settings(
    operation: Option<OptimisticOperation>,
    optimistic_row: Option<&Row>,
    optimistic_data: Option<&Rows>,
) -> Result<()> {
    match operation {
        Some(
            OptimisticOperation::AddRow
            | OptimisticOperation::EditRow
            | OptimisticOperation::DeleteRow,
        ) => {
            if optimistic_row.is_none() {
                return Err(ValidationError::new(
                    "optimisticRow",
                    "a single row object is required for the addRow, editRow, and deleteRow \
                     optimistic operations",
                )
                .into());
            }
        }
        Some(OptimisticOperation::ReplaceData) => {
            if optimistic_data.map_or(true, |rows| rows.is_empty()) {
                return Err(ValidationError::new(
                    "optimisticData",
                    "a non-empty array of rows is required for the replaceData optimistic \
                     operation",
                )
                .into());
            }
        }
        None => {}
    }
    Ok(())
}

fn kind_name(kind: MutationKind) -> &'static str {
    match kind {
        MutationKind::Insert => "insert",
        MutationKind::Update => "update",
        MutationKind::Delete => "delete",
        MutationKind::Rpc => "rpc",
        MutationKind::FlexibleMutation => "flexibleMutation",
    }
}

// ============================================================================
// Tests
// ============================================================================
