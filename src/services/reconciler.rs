//! Payment gateway callback reconciliation.
//!
//! ```text
//! RECEIVED -> SIGNATURE_CHECK -> REJECTED (terminal)
//!                             -> INTENT_LOOKUP -> NOT_FOUND | AMOUNT_MISMATCH | RECONCILED
//! ```
//!
//! `NOT_FOUND` and `AMOUNT_MISMATCH` leave the intent pending for manual
//! reconciliation. On a match the workflow credits the intent's
//! pre-agreed stars, never the reported amount, and only then is the intent
//! completed. Redelivered callbacks re-run the workflow under the same
//! operation key, which records nothing new.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::AppError;
use crate::models::intent::{IntentStatus, PaymentIntent};
use crate::models::payment::{PaymentEvent, PaymentProcessRequest};
use crate::models::transaction::Transaction;
use crate::models::webhook::GatewayCallback;
use crate::services::retry::{RetryPolicy, retry};
use crate::services::signature;
use crate::services::workflow::PaymentWorkflow;
use crate::store::IntentStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    NotFound,
    AmountMismatch { expected: Decimal, reported: Decimal },
    Reconciled { transaction: Transaction },
    /// Callback for an invoice already credited
    Duplicate { transaction: Transaction },
}

#[derive(Clone)]
pub struct WebhookReconciler {
    result_secret: String,
    intents: Arc<dyn IntentStore>,
    workflow: PaymentWorkflow,
    retry_policy: RetryPolicy,
}

impl WebhookReconciler {
    pub fn new(
        result_secret: String,
        intents: Arc<dyn IntentStore>,
        workflow: PaymentWorkflow,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            result_secret,
            intents,
            workflow,
            retry_policy,
        }
    }

    /// Verify and apply one callback delivery.
    ///
    /// # Errors
    ///
    /// - `InvalidSignature`: the signature does not cover the declared fields
    /// - storage errors once retries are exhausted
    pub async fn reconcile(&self, callback: &GatewayCallback) -> Result<ReconcileOutcome, AppError> {
        signature::verify_callback(&self.result_secret, callback).inspect_err(|_| {
            tracing::warn!(invoice_id = callback.invoice_id, "callback rejected: bad signature");
        })?;

        let intent = retry(&self.retry_policy, "intent.find", || {
            self.intents.find_by_invoice(callback.invoice_id)
        })
        .await?;

        let Some(intent) = intent else {
            tracing::warn!(
                invoice_id = callback.invoice_id,
                out_sum = %callback.out_sum,
                "callback for unknown invoice left for manual reconciliation"
            );
            return Ok(ReconcileOutcome::NotFound);
        };

        if intent.amount != callback.out_sum {
            tracing::warn!(
                invoice_id = intent.invoice_id,
                expected = %intent.amount,
                reported = %callback.out_sum,
                "amount mismatch, intent left pending"
            );
            return Ok(ReconcileOutcome::AmountMismatch {
                expected: intent.amount,
                reported: callback.out_sum,
            });
        }

        // Credit first: the workflow is idempotent under `gateway:<InvId>`,
        // and a failure here leaves the intent pending for redelivery or
        // manual reconciliation.
        let event = self.workflow.process(credit_request(&intent, callback)).await?;
        let (transaction, duplicate) = match event {
            PaymentEvent::Completed {
                transaction,
                duplicate,
            } => (transaction, duplicate),
            PaymentEvent::Failed { reason, .. } => {
                return Err(AppError::InvalidRequest(format!(
                    "credit for invoice {} rejected: {reason:?}",
                    intent.invoice_id
                )));
            }
        };

        // Only a recorded credit completes the intent
        let transitioned = retry(&self.retry_policy, "intent.complete", || {
            self.intents.mark_completed(intent.invoice_id)
        })
        .await?;
        if !transitioned && intent.status == IntentStatus::Completed {
            tracing::info!(invoice_id = intent.invoice_id, "intent already completed");
        }

        if duplicate {
            return Ok(ReconcileOutcome::Duplicate { transaction });
        }
        tracing::info!(
            invoice_id = intent.invoice_id,
            account_id = %intent.account_id,
            tenant_id = %intent.tenant_id,
            stars = %intent.stars,
            "invoice reconciled"
        );
        Ok(ReconcileOutcome::Reconciled { transaction })
    }
}

fn credit_request(intent: &PaymentIntent, callback: &GatewayCallback) -> PaymentProcessRequest {
    PaymentProcessRequest {
        account_id: intent.account_id.clone(),
        tenant_id: intent.tenant_id.clone(),
        amount: intent.stars,
        kind: intent.kind,
        description: Some(format!("Gateway invoice {}", intent.invoice_id)),
        operation_key: Some(intent.operation_key()),
        service_type: intent.service_type.clone(),
        metadata: Some(serde_json::json!({
            "invoice_id": intent.invoice_id,
            "out_sum": callback.out_sum_raw,
        })),
    }
}
