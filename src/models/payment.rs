//! Internal event interface: `payment.process`, `payment.refund` and their outcomes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::transaction::{Transaction, TransactionKind};

/// `payment.process` request sent by feature adapters.
///
/// # JSON Example
///
/// ```json
/// {
///   "account_id": "144022504",
///   "tenant_id": "neuro_blogger_bot",
///   "amount": "7.5",
///   "kind": "expense",
///   "description": "Image generation",
///   "operation_key": "img-2f1c",
///   "service_type": "neuro_photo",
///   "metadata": {"model": "flux"}
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentProcessRequest {
    pub account_id: String,
    pub tenant_id: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    #[serde(default)]
    pub description: Option<String>,
    /// Generated when absent; retries then cannot be deduplicated
    #[serde(default)]
    pub operation_key: Option<String>,
    #[serde(default)]
    pub service_type: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// `payment.refund` request sent by a feature whose downstream work failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub original_operation_key: String,
    pub tenant_id: String,
    pub reason: String,
}

/// Outcome emitted by the payment workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum PaymentEvent {
    #[serde(rename = "payment.completed")]
    Completed {
        transaction: Transaction,
        /// The operation key had already been recorded; nothing new was written
        duplicate: bool,
    },
    #[serde(rename = "payment.failed")]
    Failed {
        account_id: String,
        tenant_id: String,
        operation_key: String,
        reason: FailureReason,
    },
}

impl PaymentEvent {
    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            PaymentEvent::Completed { transaction, .. } => Some(transaction),
            PaymentEvent::Failed { .. } => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PaymentEvent::Completed { .. })
    }
}

/// Why a payment was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum FailureReason {
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },
}
