//! HTTP middleware components.

/// Bearer key authentication for internal endpoints
pub mod auth;
