//! HTTP request handlers (route handlers).
//!
//! Each handler extracts request data, hands it to a service from
//! [`AppState`](crate::state::AppState) and maps the result to a response.

/// Balance and history views
pub mod accounts;
pub mod health;
/// Checkout intents
pub mod intents;
/// Internal payment event interface
pub mod payments;
/// Gateway result callback
pub mod webhooks;
