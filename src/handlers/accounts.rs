//! Account ledger views.
//!
//! - GET /api/v1/tenants/{tenant_id}/accounts/{account_id}/balance
//! - GET /api/v1/tenants/{tenant_id}/accounts/{account_id}/transactions?limit=50

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    error::AppError,
    models::account::HistoryQuery,
    models::balance::BalanceResponse,
    models::transaction::Transaction,
    state::AppState,
};

/// Current balance of one account.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "account_id": "144022504",
///   "tenant_id": "neuro_blogger_bot",
///   "total": "92.5",
///   "display_total": "92.50",
///   "income": "100",
///   "outcome": "7.5",
///   "commission": "0"
/// }
/// ```
///
/// Unknown accounts have a zero balance.
pub async fn get_balance(
    State(state): State<AppState>,
    Path((tenant_id, account_id)): Path<(String, String)>,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = state
        .workflow
        .balances()
        .balance(&account_id, &tenant_id)
        .await?;

    Ok(Json(BalanceResponse::new(account_id, tenant_id, balance)))
}

/// Ledger rows of one account, newest first.
pub async fn list_transactions(
    State(state): State<AppState>,
    Path((tenant_id, account_id)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let rows = state
        .stores
        .ledger
        .history(&account_id, &tenant_id, query.clamped_limit())
        .await?;

    Ok(Json(rows))
}
