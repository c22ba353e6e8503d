//! API key authentication for internal callers (feature adapters).
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the key from the `Authorization: Bearer <key>` header
//! 2. Hash it with SHA-256
//! 3. Compare it, in constant time, with the configured hash
//! 4. Reject mismatches with HTTP 401

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::{error::AppError, state::AppState};

/// Caller identity attached to authenticated requests.
#[derive(Debug, Clone)]
pub struct CallerContext {
    /// First 8 hex chars of the key hash, for logs
    pub key_fingerprint: String,
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Whether `api_key` hashes to `expected_sha256_hex`. An empty expectation matches nothing.
pub fn key_matches(api_key: &str, expected_sha256_hex: &str) -> bool {
    let Ok(expected) = hex::decode(expected_sha256_hex) else {
        return false;
    };
    if expected.is_empty() {
        return false;
    }
    let digest = Sha256::digest(api_key.as_bytes());
    constant_time_eq(digest.as_slice(), &expected)
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Step 1: Extract the bearer key
    let api_key = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    // Step 2: Hash and compare against the configured digest
    if !key_matches(api_key, &state.api_key_sha256) {
        tracing::warn!("rejected request with invalid API key");
        return Err(AppError::Unauthorized);
    }

    // Step 3: Attach the caller for downstream handlers
    let caller = CallerContext {
        key_fingerprint: state.api_key_sha256.chars().take(8).collect(),
    };
    request.extensions_mut().insert(caller);

    Ok(next.run(request).await)
}
