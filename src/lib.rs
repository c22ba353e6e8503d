//! Stars ledger: a multi-tenant virtual-currency ledger with durable
//! payment workflows, gateway reconciliation and user notifications.
//!
//! The binary in `main.rs` wires Postgres-backed stores into [`AppState`];
//! tests build the same state on the in-memory stores.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
pub mod store;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the HTTP router.
///
/// `/health` and the gateway callback are public; the callback is
/// authenticated by its signature. Everything under `/api/v1` requires the
/// internal bearer key.
pub fn create_router(state: AppState) -> Router {
    let authenticated_routes = Router::new()
        .route(
            "/api/v1/payments/process",
            post(handlers::payments::process_payment),
        )
        .route(
            "/api/v1/payments/refund",
            post(handlers::payments::refund_payment),
        )
        .route(
            "/api/v1/tenants/{tenant_id}/accounts/{account_id}/balance",
            get(handlers::accounts::get_balance),
        )
        .route(
            "/api/v1/tenants/{tenant_id}/accounts/{account_id}/transactions",
            get(handlers::accounts::list_transactions),
        )
        .route(
            "/api/v1/tenants/{tenant_id}/operations/{operation_key}",
            get(handlers::payments::get_operation),
        )
        .route("/api/v1/intents", post(handlers::intents::create_intent))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/webhooks/gateway/result",
            post(handlers::webhooks::gateway_result),
        )
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
