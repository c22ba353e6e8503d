//! Payment HTTP handlers (internal event interface).
//!
//! - POST /api/v1/payments/process - `payment.process`
//! - POST /api/v1/payments/refund - `payment.refund`
//! - GET /api/v1/tenants/{tenant_id}/operations/{operation_key} - ledger row by key

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    error::AppError,
    middleware::auth::CallerContext,
    models::payment::{PaymentEvent, PaymentProcessRequest, RefundRequest},
    models::transaction::Transaction,
    state::AppState,
};

/// Run the payment workflow for one request.
///
/// # Request Body
///
/// ```json
/// {
///   "account_id": "144022504",
///   "tenant_id": "neuro_blogger_bot",
///   "amount": "7.5",
///   "kind": "expense",
///   "operation_key": "img-2f1c",
///   "service_type": "neuro_photo"
/// }
/// ```
///
/// # Response
///
/// - **200**: `{"event": "payment.completed", "transaction": {...}, "duplicate": false}`
/// - **422**: `{"event": "payment.failed", "reason": {"code": "insufficient_funds", ...}}`
/// - **400**: invalid amount or identifiers
/// - **503**: storage unavailable after retries
pub async fn process_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Json(request): Json<PaymentProcessRequest>,
) -> Result<(StatusCode, Json<PaymentEvent>), AppError> {
    tracing::debug!(
        caller = %caller.key_fingerprint,
        account_id = %request.account_id,
        tenant_id = %request.tenant_id,
        kind = request.kind.as_str(),
        "payment.process"
    );

    let event = state.workflow.process(request).await?;
    let status = if event.is_completed() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };

    Ok((status, Json(event)))
}

/// Compensate a failed downstream operation.
///
/// # Response
///
/// - **200**: the refund row (the same row on repeated calls)
/// - **422**: `nothing_to_refund`
pub async fn refund_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<Transaction>, AppError> {
    tracing::debug!(
        caller = %caller.key_fingerprint,
        original_operation_key = %request.original_operation_key,
        tenant_id = %request.tenant_id,
        "payment.refund"
    );

    let refund = state.compensation.refund(request).await?;
    Ok(Json(refund))
}

/// Completed ledger row recorded under an operation key.
pub async fn get_operation(
    State(state): State<AppState>,
    Path((tenant_id, operation_key)): Path<(String, String)>,
) -> Result<Json<Transaction>, AppError> {
    let transaction = state
        .stores
        .ledger
        .find_by_operation_key(&tenant_id, &operation_key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("operation {operation_key}")))?;

    Ok(Json(transaction))
}
