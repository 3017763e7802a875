//! Store-specific error types.
//!
//! Every record store operation returns [`StoreError`] on failure. Validation
//! errors are raised before any mutation takes place, so a failed call never
//! leaves a partial write behind.

use thiserror::Error;

use crate::store::types::EmployeeId;

/// Errors that can occur in the record store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Malformed identifier, name, position, compensation or rating.
    #[error("invalid {field}: {reason}")]
    InvalidArgument {
        field: &'static str,
        reason: String,
    },

    /// The referenced employee does not exist.
    #[error("employee {0} not found")]
    NotFound(EmployeeId),

    /// An employee with this identifier is already stored.
    #[error("employee {0} already exists")]
    AlreadyExists(EmployeeId),

    /// The operation is disabled for this store.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl StoreError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }

    /// Returns true for caller errors detected by validation.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}

/// A failed entry of a bulk create.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("error adding employee {id}: {source}")]
pub struct BatchError {
    /// Identifier carried by the rejected draft.
    pub id: EmployeeId,
    /// Why the draft was rejected.
    pub source: StoreError,
}
