//! Error types and HTTP error response handling.
//!
//! This module defines all ledger errors, how they are classified for retry,
//! and how they are converted into HTTP responses with appropriate status
//! codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Storage Errors**: `Database`, `StorageUnavailable` (retryable when transient)
/// - **Network Errors**: `Network` (retryable)
/// - **Business Rejections**: `InsufficientFunds`, `NothingToRefund` (terminal)
/// - **Validation Errors**: `InvalidSignature`, `InvalidRequest` (terminal)
/// - **Notification Errors**: `Notify` (logged, never fails a workflow)
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (connection error, query error, ...).
    ///
    /// Connection-level failures are retryable, query errors are not.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Ledger storage could not be reached.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Outbound HTTP call failed or timed out.
    #[error("Network error: {0}")]
    Network(String),

    /// The debit would drive the balance below zero.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    /// Compensation was requested for an operation that was never debited.
    #[error("Nothing to refund for operation {0}")]
    NothingToRefund(String),

    /// Gateway callback signature did not match.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Request body or parameters are invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Notification delivery failed.
    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Bearer key is missing or wrong.
    #[error("Unauthorized")]
    Unauthorized,
}

impl AppError {
    /// Whether the failure is transient and the operation may be attempted again.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Database(err) => matches!(
                err,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
                    | sqlx::Error::Tls(_)
            ),
            AppError::StorageUnavailable(_) | AppError::Network(_) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}

/// Convert AppError into an HTTP response.
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Storage and network details are hidden from the client.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", self.to_string()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::InsufficientFunds { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "insufficient_funds",
                self.to_string(),
            ),
            AppError::NothingToRefund(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "nothing_to_refund",
                self.to_string(),
            ),
            AppError::InvalidSignature => {
                (StatusCode::BAD_REQUEST, "invalid_signature", self.to_string())
            }
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::StorageUnavailable(_) | AppError::Network(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "temporarily_unavailable",
                "The service is temporarily unavailable, try again later".to_string(),
            ),
            AppError::Database(_)
            | AppError::Notify(_)
            | AppError::Serialization(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
