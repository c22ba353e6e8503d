//! Liveness and storage readiness probe.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ledger: &'static str,
    pub version: &'static str,
    pub checked_at: DateTime<Utc>,
}

/// `GET /health`
///
/// ```json
/// {
///   "status": "healthy",
///   "ledger": "connected",
///   "version": "0.1.0",
///   "checked_at": "2026-01-15T19:00:00Z"
/// }
/// ```
///
/// An unreachable ledger store yields the standard error body.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    state.stores.ledger.ping().await?;

    Ok(Json(HealthResponse {
        status: "healthy",
        ledger: "connected",
        version: env!("CARGO_PKG_VERSION"),
        checked_at: Utc::now(),
    }))
}
