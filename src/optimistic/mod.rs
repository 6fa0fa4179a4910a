//! Optimistic prediction: the pure transform library and the operation
//! selector that wires a mutation kind to the right transform.

pub mod selector;
pub mod transforms;

pub use selector::{derive_operation, select_transform, OptimisticOperation, Transform};
pub use transforms::{
    add_row, delete_row, edit_row, replace_data, return_unchanged, TransformContext,
};

use serde_json::Value;

use crate::types::{Row, Rows};

/// The optimistic prediction input, as an explicit union — a single (marked)
/// row, a whole-collection replacement, or nothing.
#[derive(Debug, Clone)]
pub enum OptimisticInput {
    Row(Row),
    Data(Rows),
    None,
}

impl OptimisticInput {
    pub fn is_none(&self) -> bool {
        matches!(self, OptimisticInput::None)
    }

    /// The input as a JSON value for result/error envelopes.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            OptimisticInput::Row(row) => Some(Value::Object(row.clone())),
            OptimisticInput::Data(rows) => Some(Value::Array(
                rows.iter().cloned().map(Value::Object).collect(),
            )),
            OptimisticInput::None => None,
        }
    }
}
