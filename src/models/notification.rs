//! User-facing notification models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message the tenant's delivery channel renders for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    PaymentCompleted,
    TopupCompleted,
    SubscriptionActivated,
    PaymentFailed,
    RefundCompleted,
}

/// JSON body posted to a tenant delivery endpoint.
///
/// ```json
/// {
///   "event_id": "550e8400-e29b-41d4-a716-446655440000",
///   "tenant_id": "neuro_blogger_bot",
///   "account_id": "144022504",
///   "template": "topup_completed",
///   "params": {"amount": "217", "balance": "317"},
///   "created_at": "2026-01-15T10:30:00Z"
/// }
/// ```
///
/// Delivery carries an `X-Signature: sha256=<hex>` header over this body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub event_id: Uuid,
    pub tenant_id: String,
    pub account_id: String,
    pub template: NotificationTemplate,
    pub params: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl NotificationPayload {
    pub fn new(
        account_id: &str,
        tenant_id: &str,
        template: NotificationTemplate,
        params: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            account_id: account_id.to_string(),
            template,
            params,
            created_at: Utc::now(),
        }
    }
}
