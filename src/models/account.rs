//! Account-scoped query parameters.
//!
//! The ledger only records that an account exists (see
//! [`AccountDirectory`](crate::store::AccountDirectory)); identity data lives
//! in the identity store.

use serde::Deserialize;

/// Query parameters for history listing.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

impl HistoryQuery {
    /// Limit clamped to `1..=500`.
    pub fn clamped_limit(&self) -> i64 {
        self.limit.clamp(1, 500)
    }
}
