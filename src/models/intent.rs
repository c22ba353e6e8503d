//! Payment intents: gateway invoices waiting for a confirming callback.
//!
//! An intent is created `Pending` when an invoice is issued and moves to
//! `Completed` exactly once, after a signed callback whose amount matches.
//! It never moves backward.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::transaction::TransactionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Pending,
    Completed,
}

/// Maps to the `payment_intents` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Gateway invoice identifier (`InvId`)
    pub invoice_id: i64,
    pub account_id: String,
    pub tenant_id: String,
    /// Expected gateway amount in currency units (`OutSum`)
    pub amount: Decimal,
    /// Pre-agreed stars to credit
    pub stars: Decimal,
    /// `Income` or `SubscriptionPurchase`
    pub kind: TransactionKind,
    pub service_type: String,
    pub status: IntentStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PaymentIntent {
    /// Ledger operation key for the credit this intent produces.
    pub fn operation_key(&self) -> String {
        format!("gateway:{}", self.invoice_id)
    }
}

/// Intent fields chosen by the caller; id and timestamps come from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIntent {
    pub account_id: String,
    pub tenant_id: String,
    pub amount: Decimal,
    pub stars: Decimal,
    pub kind: TransactionKind,
    pub service_type: String,
}

/// Request body for `POST /api/v1/intents`.
///
/// ```json
/// {
///   "account_id": "144022504",
///   "tenant_id": "neuro_blogger_bot",
///   "amount": "500",
///   "subscription": "neurophoto"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    pub account_id: String,
    pub tenant_id: String,
    pub amount: Decimal,
    /// Present for subscription purchases
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateIntentResponse {
    pub invoice_id: i64,
    pub amount: Decimal,
    pub stars: Decimal,
    pub kind: TransactionKind,
    pub status: IntentStatus,
    pub payment_url: String,
}
