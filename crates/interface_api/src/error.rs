//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use core_kernel::{CoreError, TemporalError};
use domain_billing::BillingError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg),
            ApiError::Internal(msg) => {
                error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

/// - `NotFound` -> 404
/// - `InvalidArgument` -> 400
/// - `StateConflict` -> 409, message names the current state
/// - `Store` -> 500, or 503 when the store is unreachable
impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            BillingError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            BillingError::StateConflict { .. } => ApiError::Conflict(err.to_string()),
            BillingError::Store(port) if port.is_transient() => ApiError::ServiceUnavailable(port.to_string()),
            BillingError::Store(port) => ApiError::Internal(port.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<TemporalError> for ApiError {
    fn from(err: TemporalError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::PortError;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_billing_error_statuses() {
        assert_eq!(status_of(BillingError::not_found("Invoice", "INV-1")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(BillingError::invalid("amount must be positive")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(BillingError::conflict("Refund", "RFD-1", "COMPLETED", "cannot approve")),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(BillingError::Store(PortError::internal("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(BillingError::Store(PortError::connection("refused"))),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_conflict_message_names_current_state() {
        let api: ApiError = BillingError::conflict("Aid", "AID-1", "REVOKED", "already revoked").into();
        assert!(api.to_string().contains("REVOKED"));
    }
}
