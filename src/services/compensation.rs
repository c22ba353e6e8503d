//! Compensation: refunding a debit whose downstream work failed.
//!
//! The refund reuses the original debit's amount, account and service, and
//! is recorded under the deterministic key `refund:<original key>`, so a
//! second compensation attempt for the same failure returns the first
//! refund instead of paying twice.

use crate::error::AppError;
use crate::models::payment::RefundRequest;
use crate::models::transaction::{Transaction, TransactionDraft, TransactionKind};
use crate::services::retry::retry;
use crate::services::workflow::{PaymentWorkflow, WorkflowRun, WorkflowState, template_for};

pub const ORIGINAL_OPERATION_KEY: &str = "original_operation_key";

/// Deterministic refund key for a debit.
pub fn refund_operation_key(original_operation_key: &str) -> String {
    format!("refund:{original_operation_key}")
}

#[derive(Clone)]
pub struct CompensationHandler {
    workflow: PaymentWorkflow,
}

impl CompensationHandler {
    pub fn new(workflow: PaymentWorkflow) -> Self {
        Self { workflow }
    }

    /// Handle a `payment.refund` request.
    ///
    /// # Errors
    ///
    /// - `NothingToRefund`: no completed expense exists under the key
    /// - storage errors once retries are exhausted
    #[tracing::instrument(
        skip_all,
        fields(tenant_id = %request.tenant_id, original = %request.original_operation_key)
    )]
    pub async fn refund(&self, request: RefundRequest) -> Result<Transaction, AppError> {
        let RefundRequest {
            original_operation_key,
            tenant_id,
            reason,
        } = request;
        let wf = &self.workflow;
        let refund_key = refund_operation_key(&original_operation_key);

        let mut run = WorkflowRun::start(
            format!("refund:{tenant_id}:{original_operation_key}"),
            wf.journal.as_ref(),
            &wf.retry_policy,
            WorkflowState::Recorded,
        );
        run.transition(WorkflowState::Compensating);

        // Step 1: the debit being compensated, read live
        let original = retry(&wf.retry_policy, "find_original", || {
            wf.ledger.find_by_operation_key(&tenant_id, &original_operation_key)
        })
        .await?
        .filter(|tx| tx.kind == TransactionKind::Expense)
        .ok_or_else(|| AppError::NothingToRefund(original_operation_key.clone()))?;

        // Step 2: mirror it as a refund under the derived key
        let draft = TransactionDraft::new(
            original.account_id.clone(),
            tenant_id.clone(),
            original.amount,
            TransactionKind::Refund,
            refund_key,
        )
        .with_service_type(original.service_type.clone())
        .with_description(Some(format!("Refund: {reason}")))
        .with_meta(ORIGINAL_OPERATION_KEY, original_operation_key.clone())
        .with_meta("original_transaction_id", original.id.to_string())
        .with_meta("reason", reason.clone());

        let recorded = run
            .step("record_refund", || wf.ledger.record(draft.clone()))
            .await?;
        wf.balances.invalidate(&original.account_id, &tenant_id).await;

        // Step 3: notify once
        if recorded.duplicate {
            tracing::info!(instance = %run.instance_id(), "refund already recorded");
        } else {
            let refund = &recorded.transaction;
            run.best_effort("notify", || async {
                wf.notifier
                    .notify(
                        &refund.account_id,
                        &refund.tenant_id,
                        template_for(refund.kind),
                        serde_json::json!({
                            "amount": refund.amount,
                            "original_operation_key": original_operation_key,
                            "reason": reason,
                        }),
                    )
                    .await
            })
            .await;
        }

        run.transition(WorkflowState::Compensated);
        Ok(recorded.transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refund_key_is_deterministic() {
        assert_eq!(refund_operation_key("img-1"), "refund:img-1");
        assert_eq!(refund_operation_key("img-1"), refund_operation_key("img-1"));
    }
}
