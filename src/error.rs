use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// A synchronous, pre-flight configuration failure.
///
/// Raised before any network call when a mutation request is malformed
/// (wrong payload shape, missing filters, mutually exclusive optimistic
/// inputs, empty table name). `field` names the offending setting.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#"Validation failed for "{}": {}"#, self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// InvalidOptimisticOperationError
// ---------------------------------------------------------------------------

/// An unrecognized optimistic-operation literal was supplied.
///
/// This is a configuration error raised at the string boundary, before any
/// network call. The message carries both the offending value and the action
/// it was supplied to.
#[derive(Debug, Clone, Error)]
#[error(
    "Invalid optimistic operation specified in \"{action}\" action. \
     You specified \"{operation}\" but the allowed values are \"addRow\", \
     \"editRow\", \"deleteRow\", \"replaceData\" or blank for no optimistic operation."
)]
pub struct InvalidOptimisticOperationError {
    pub operation: String,
    pub action: String,
}

// ---------------------------------------------------------------------------
// InvalidOptimisticInputError
// ---------------------------------------------------------------------------

/// The optimistic input cannot drive the requested prediction — the value at
/// the unique-identifier field is not a string or number.
#[derive(Debug, Clone, Error)]
#[error(
    "Cannot read the unique identifier \"{field}\" from the optimistic row: \
     expected a string or number, received {received}"
)]
pub struct InvalidOptimisticInputError {
    pub field: String,
    pub received: String,
}

// ---------------------------------------------------------------------------
// RemoteOperationError
// ---------------------------------------------------------------------------

/// The backend reported a failure on the real mutation or fetch.
///
/// Always caught by the reconciliation controller and converted into a
/// `ProviderError` envelope — never surfaced as a rejected mutation call.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RemoteOperationError {
    pub message: String,
    /// Backend-specific error code, when one was reported.
    pub code: Option<String>,
}

impl RemoteOperationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Error — top-level rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    InvalidOptimisticOperation(#[from] InvalidOptimisticOperationError),

    #[error(transparent)]
    InvalidOptimisticInput(#[from] InvalidOptimisticInputError),

    #[error(transparent)]
    Remote(#[from] RemoteOperationError),
}

impl Error {
    /// True for the synchronous configuration errors that abort a call
    /// before any network traffic.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Error::Remote(_))
    }
}

/// Convenience alias — the default error type is `Error`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
