//! Ledger entry models.
//!
//! This module defines:
//! - `Transaction`: an immutable ledger row
//! - `TransactionKind` / `TransactionStatus`: direction and lifecycle of a row
//! - `TransactionDraft`: what callers hand to the ledger store
//! - `Recorded`: the store's answer, telling new rows from idempotent replays

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a ledger row does to the balance.
///
/// Stored as snake_case text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
    Refund,
    Bonus,
    SubscriptionPurchase,
    SubscriptionRenewal,
    Referral,
    System,
}

impl TransactionKind {
    /// Kinds that add to the balance.
    pub fn is_credit(self) -> bool {
        Self::CREDITS.contains(&self)
    }

    pub const CREDITS: [TransactionKind; 6] = [
        TransactionKind::Income,
        TransactionKind::Bonus,
        TransactionKind::Refund,
        TransactionKind::Referral,
        TransactionKind::SubscriptionPurchase,
        TransactionKind::SubscriptionRenewal,
    ];

    /// Kinds that subtract from the balance and need a funds check.
    pub fn is_debit(self) -> bool {
        self == TransactionKind::Expense
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
            TransactionKind::Refund => "refund",
            TransactionKind::Bonus => "bonus",
            TransactionKind::SubscriptionPurchase => "subscription_purchase",
            TransactionKind::SubscriptionRenewal => "subscription_renewal",
            TransactionKind::Referral => "referral",
            TransactionKind::System => "system",
        }
    }
}

/// Lifecycle of a ledger row. Only `Completed` rows count toward the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// Represents a ledger row.
///
/// # Database Table
///
/// Maps to the `transactions` table. Rows are never updated or deleted;
/// corrections are new rows. `amount` is always positive, the direction
/// comes from `kind`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,

    /// Owning user identity (opaque, e.g. a messaging-platform id)
    pub account_id: String,

    /// Bot/brand namespace the balance is scoped to
    pub tenant_id: String,

    /// Stars, full precision
    pub amount: Decimal,

    pub kind: TransactionKind,

    pub status: TransactionStatus,

    /// Idempotency key, unique per tenant among completed rows
    pub operation_key: String,

    /// Feature or service that caused the row
    pub service_type: String,

    pub description: Option<String>,

    /// Gateway invoice id, error details, refund correlation, commission
    pub metadata: serde_json::Value,

    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Decimal stored under `metadata.<key>`, accepting both JSON strings and numbers.
    pub fn metadata_decimal(&self, key: &str) -> Option<Decimal> {
        match self.metadata.get(key)? {
            serde_json::Value::String(s) => s.parse().ok(),
            serde_json::Value::Number(n) => n.to_string().parse().ok(),
            _ => None,
        }
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// A ledger row before it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub account_id: String,
    pub tenant_id: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub operation_key: String,
    pub service_type: String,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
}

impl TransactionDraft {
    /// A completed draft with empty metadata.
    pub fn new(
        account_id: impl Into<String>,
        tenant_id: impl Into<String>,
        amount: Decimal,
        kind: TransactionKind,
        operation_key: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            tenant_id: tenant_id.into(),
            amount,
            kind,
            status: TransactionStatus::Completed,
            operation_key: operation_key.into(),
            service_type: String::new(),
            description: None,
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_service_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = service_type.into();
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Merge `key = value` into the metadata object.
    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        if !self.metadata.is_object() {
            self.metadata = serde_json::Value::Object(Default::default());
        }
        if let Some(map) = self.metadata.as_object_mut() {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    /// Assign an id and timestamp.
    pub fn into_transaction(self) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            account_id: self.account_id,
            tenant_id: self.tenant_id,
            amount: self.amount,
            kind: self.kind,
            status: self.status,
            operation_key: self.operation_key,
            service_type: self.service_type,
            description: self.description,
            metadata: self.metadata,
            created_at: Utc::now(),
        }
    }
}

/// Result of `LedgerStore::record`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recorded {
    pub transaction: Transaction,

    /// True when a completed row already existed for the key and nothing was written
    pub duplicate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn only_expense_is_debit() {
        assert!(TransactionKind::Expense.is_debit());
        assert!(!TransactionKind::Expense.is_credit());
        assert!(TransactionKind::Refund.is_credit());
        assert!(!TransactionKind::System.is_credit());
        assert!(!TransactionKind::System.is_debit());
    }

    #[test]
    fn metadata_decimal_reads_strings_and_numbers() {
        let tx = TransactionDraft::new("1", "bot", dec!(10), TransactionKind::Income, "k")
            .with_meta("commission", "0.35")
            .with_meta("fee", 2)
            .into_transaction();
        assert_eq!(tx.metadata_decimal("commission"), Some(dec!(0.35)));
        assert_eq!(tx.metadata_decimal("fee"), Some(dec!(2)));
        assert_eq!(tx.metadata_decimal("missing"), None);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&TransactionKind::SubscriptionPurchase).unwrap();
        assert_eq!(json, "\"subscription_purchase\"");
        assert_eq!(TransactionKind::SubscriptionPurchase.as_str(), "subscription_purchase");
    }
}
