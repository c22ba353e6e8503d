//! Invoice creation.

use axum::{Json, extract::State, http::StatusCode};

use crate::{
    error::AppError,
    models::intent::{CreateIntentRequest, CreateIntentResponse},
    state::AppState,
};

/// Create a pending payment intent.
///
/// # Endpoint
///
/// `POST /api/v1/intents`
///
/// # Response (201 Created)
///
/// ```json
/// {
///   "invoice_id": 1042,
///   "amount": "500",
///   "stars": "217",
///   "kind": "income",
///   "status": "pending",
///   "payment_url": "https://pay.example.com/merchant/checkout?MerchantLogin=..."
/// }
/// ```
pub async fn create_intent(
    State(state): State<AppState>,
    Json(request): Json<CreateIntentRequest>,
) -> Result<(StatusCode, Json<CreateIntentResponse>), AppError> {
    let created = state.invoices.create(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
