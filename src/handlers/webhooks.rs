//! Payment gateway result callback.
//!
//! Every callback that passes signature validation is answered `OK<InvId>`,
//! including ones left for manual reconciliation and ones that failed
//! internally. Only malformed or forged callbacks get a 400.

use std::collections::HashMap;

use axum::{
    Form,
    extract::{State, rejection::FormRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    models::webhook::GatewayCallback,
    services::reconciler::ReconcileOutcome,
    state::AppState,
};

/// `POST /webhooks/gateway/result`
///
/// # Response
///
/// - **200** `OK1042`: any outcome after the signature checks out
/// - **400**: unparsable form or bad signature
pub async fn gateway_result(
    State(state): State<AppState>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "unreadable gateway callback");
            return (StatusCode::BAD_REQUEST, "bad request").into_response();
        }
    };

    let callback = match GatewayCallback::from_form(&form) {
        Ok(callback) => callback,
        Err(e) => {
            tracing::warn!(error = %e, "malformed gateway callback");
            return (StatusCode::BAD_REQUEST, "bad request").into_response();
        }
    };

    match state.reconciler.reconcile(&callback).await {
        Ok(outcome) => {
            match &outcome {
                ReconcileOutcome::Reconciled { transaction } | ReconcileOutcome::Duplicate { transaction } => {
                    tracing::debug!(invoice_id = callback.invoice_id, transaction_id = %transaction.id, "callback acknowledged");
                }
                ReconcileOutcome::NotFound | ReconcileOutcome::AmountMismatch { .. } => {
                    tracing::debug!(invoice_id = callback.invoice_id, ?outcome, "callback acknowledged without credit");
                }
            }
            (StatusCode::OK, callback.ack()).into_response()
        }
        Err(AppError::InvalidSignature) => (StatusCode::BAD_REQUEST, "bad signature").into_response(),
        Err(e) => {
            tracing::error!(invoice_id = callback.invoice_id, error = %e, "callback failed");
            (StatusCode::OK, callback.ack()).into_response()
        }
    }
}
