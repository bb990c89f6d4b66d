//! Billing domain errors

use thiserror::Error;

use core_kernel::{CoreError, MoneyError, PortError};

/// Errors that can occur in the billing domain
///
/// Variants follow the failure taxonomy callers act on: a missing record, a
/// request that is wrong on its face, a request that is wrong for the record's
/// current state, and a failure in the underlying store.
#[derive(Debug, Error)]
pub enum BillingError {
    /// A referenced record does not exist
    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    /// The request was rejected before any mutation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The request is not valid for the record's current state
    #[error("{entity} {id} is {current}: {message}")]
    StateConflict {
        entity: &'static str,
        id: String,
        current: String,
        message: String,
    },

    /// The store failed
    #[error("Store error: {0}")]
    Store(PortError),
}

impl BillingError {
    pub fn not_found(entity: impl Into<String>, key: impl std::fmt::Display) -> Self {
        BillingError::NotFound {
            entity: entity.into(),
            key: key.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        BillingError::InvalidArgument(message.into())
    }

    pub fn conflict(
        entity: &'static str,
        id: impl std::fmt::Display,
        current: impl std::fmt::Display,
        message: impl Into<String>,
    ) -> Self {
        BillingError::StateConflict {
            entity,
            id: id.to_string(),
            current: current.to_string(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BillingError::NotFound { .. })
    }
}

impl From<PortError> for BillingError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity_type, id } => BillingError::NotFound {
                entity: entity_type,
                key: id,
            },
            PortError::Conflict { message } => BillingError::InvalidArgument(message),
            other => BillingError::Store(other),
        }
    }
}

impl From<CoreError> for BillingError {
    fn from(err: CoreError) -> Self {
        BillingError::InvalidArgument(err.to_string())
    }
}

impl From<MoneyError> for BillingError {
    fn from(err: MoneyError) -> Self {
        BillingError::InvalidArgument(err.to_string())
    }
}

/// Result type for billing operations
pub type BillingResult<T> = Result<T, BillingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_errors_map_to_taxonomy() {
        let err: BillingError = PortError::not_found("Invoice", "INV-1").into();
        assert!(err.is_not_found());

        let err: BillingError = PortError::conflict("duplicate reference number").into();
        assert!(matches!(err, BillingError::InvalidArgument(_)));

        let err: BillingError = PortError::connection("refused").into();
        assert!(matches!(err, BillingError::Store(_)));
    }

    #[test]
    fn test_conflict_message_names_current_state() {
        let err = BillingError::conflict("Refund", "RFD-1", "PENDING", "only approved refunds can be completed");
        assert_eq!(
            err.to_string(),
            "Refund RFD-1 is PENDING: only approved refunds can be completed"
        );
    }
}
