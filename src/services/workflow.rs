//! Payment workflow engine.
//!
//! One run handles one monetary intent (top-up, expense, bonus,
//! subscription purchase). Refunds enter through `compensation` only:
//!
//! ```text
//! RECEIVED -> VALIDATING -> INSUFFICIENT_FUNDS (terminal)
//!                        -> RECORDED -> NOTIFYING -> DONE
//! RECORDED.. -> COMPENSATING -> COMPENSATED      (see `compensation`)
//! ```
//!
//! Every step is memoized in the [`StepJournal`] under
//! `(instance_id, step_name)`, so a redelivered instance replays recorded
//! results instead of repeating side effects. Storage steps are retried
//! with backoff on transient errors. The funds check is advisory: the
//! ledger store repeats it atomically with the insert, and a debit that
//! loses a race is reported exactly like one that failed validation.

use std::future::Future;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::balance::Balance;
use crate::models::notification::NotificationTemplate;
use crate::models::payment::{FailureReason, PaymentEvent, PaymentProcessRequest};
use crate::models::transaction::{Recorded, TransactionDraft, TransactionKind};
use crate::services::balance::BalanceCalculator;
use crate::services::notifier::Notifier;
use crate::services::retry::{RetryPolicy, retry};
use crate::store::{AccountDirectory, LedgerStore, StepJournal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    Received,
    Validating,
    InsufficientFunds,
    Recorded,
    Notifying,
    Done,
    Compensating,
    Compensated,
}

/// Result of the pure funds check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Validation {
    Accepted,
    InsufficientFunds { required: Decimal, available: Decimal },
}

/// Step 3: expenses need `amount <= balance.total`, everything else passes.
pub fn validate(kind: TransactionKind, amount: Decimal, balance: &Balance) -> Validation {
    if kind.is_debit() && amount > balance.total {
        Validation::InsufficientFunds {
            required: amount,
            available: balance.total,
        }
    } else {
        Validation::Accepted
    }
}

/// Memoized outcome of the record step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
enum RecordOutcome {
    Recorded(Recorded),
    Rejected { required: Decimal, available: Decimal },
}

/// Execution state of one workflow instance.
pub struct WorkflowRun<'a> {
    instance_id: String,
    journal: &'a dyn StepJournal,
    retry_policy: &'a RetryPolicy,
    state: WorkflowState,
}

impl<'a> WorkflowRun<'a> {
    pub fn start(
        instance_id: String,
        journal: &'a dyn StepJournal,
        retry_policy: &'a RetryPolicy,
        state: WorkflowState,
    ) -> Self {
        tracing::info!(instance = %instance_id, ?state, "workflow started");
        Self {
            instance_id,
            journal,
            retry_policy,
            state,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn transition(&mut self, next: WorkflowState) {
        tracing::info!(instance = %self.instance_id, from = ?self.state, to = ?next, "workflow transition");
        self.state = next;
    }

    async fn memoized(&self, name: &str) -> Result<Option<serde_json::Value>, AppError> {
        retry(self.retry_policy, "journal.load", || {
            self.journal.load(&self.instance_id, name)
        })
        .await
    }

    async fn remember(&self, name: &str, value: &serde_json::Value) -> Result<(), AppError> {
        retry(self.retry_policy, "journal.save", || {
            self.journal.save(&self.instance_id, name, value)
        })
        .await
    }

    /// Run `op` once per instance; transient failures are retried.
    pub async fn step<T, F, Fut>(&self, name: &str, op: F) -> Result<T, AppError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if let Some(value) = self.memoized(name).await? {
            tracing::debug!(instance = %self.instance_id, step = name, "step replayed");
            return Ok(serde_json::from_value(value)?);
        }

        let value = retry(self.retry_policy, name, op).await?;
        self.remember(name, &serde_json::to_value(&value)?).await?;
        Ok(value)
    }

    /// Run `op` at most once successfully; failures are logged and swallowed.
    pub async fn best_effort<F, Fut>(&self, name: &str, op: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), AppError>>,
    {
        match self.memoized(name).await {
            Ok(Some(_)) => return,
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(instance = %self.instance_id, step = name, error = %err, "journal unavailable");
            }
        }

        match op().await {
            Ok(()) => {
                if let Err(err) = self.remember(name, &serde_json::Value::Bool(true)).await {
                    tracing::warn!(instance = %self.instance_id, step = name, error = %err, "could not memoize step");
                }
            }
            Err(err) => {
                tracing::warn!(instance = %self.instance_id, step = name, error = %err, "best-effort step failed");
            }
        }
    }
}

/// Template announcing a recorded row.
pub fn template_for(kind: TransactionKind) -> NotificationTemplate {
    match kind {
        TransactionKind::Income | TransactionKind::Bonus | TransactionKind::Referral => {
            NotificationTemplate::TopupCompleted
        }
        TransactionKind::SubscriptionPurchase | TransactionKind::SubscriptionRenewal => {
            NotificationTemplate::SubscriptionActivated
        }
        TransactionKind::Refund => NotificationTemplate::RefundCompleted,
        TransactionKind::Expense | TransactionKind::System => NotificationTemplate::PaymentCompleted,
    }
}

/// Dependencies shared by the payment workflow and compensation.
#[derive(Clone)]
pub struct PaymentWorkflow {
    pub(crate) ledger: Arc<dyn LedgerStore>,
    pub(crate) accounts: Arc<dyn AccountDirectory>,
    pub(crate) journal: Arc<dyn StepJournal>,
    pub(crate) balances: BalanceCalculator,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) retry_policy: RetryPolicy,
}

impl PaymentWorkflow {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        accounts: Arc<dyn AccountDirectory>,
        journal: Arc<dyn StepJournal>,
        balances: BalanceCalculator,
        notifier: Arc<dyn Notifier>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            ledger,
            accounts,
            journal,
            balances,
            notifier,
            retry_policy,
        }
    }

    pub fn balances(&self) -> &BalanceCalculator {
        &self.balances
    }

    /// Handle a `payment.process` request.
    ///
    /// # Returns
    ///
    /// - `PaymentEvent::Completed` with `duplicate = true` when the operation
    ///   key was already recorded (nothing is written or notified again)
    /// - `PaymentEvent::Failed` for an expense the balance cannot cover
    ///   (nothing is written)
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: non-positive amount, empty identifiers or a
    ///   refund kind
    /// - storage errors once retries are exhausted
    #[tracing::instrument(
        skip_all,
        fields(tenant_id = %request.tenant_id, account_id = %request.account_id)
    )]
    pub async fn process(&self, request: PaymentProcessRequest) -> Result<PaymentEvent, AppError> {
        // Step 0: reject malformed requests before anything is journaled
        validate_request(&request)?;

        let operation_key = request
            .operation_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| format!("op_{}", Uuid::new_v4()));
        let account_id = request.account_id.as_str();
        let tenant_id = request.tenant_id.as_str();
        let instance_id = format!("payment:{tenant_id}:{operation_key}");

        let mut run = WorkflowRun::start(
            instance_id,
            self.journal.as_ref(),
            &self.retry_policy,
            WorkflowState::Received,
        );

        // Idempotency guard, read live on every delivery: a recorded key
        // short-circuits the whole run
        let existing = retry(&self.retry_policy, "find_existing", || {
            self.ledger.find_by_operation_key(tenant_id, &operation_key)
        })
        .await?;
        if let Some(transaction) = existing {
            tracing::info!(instance = %run.instance_id(), "operation already recorded");
            run.transition(WorkflowState::Done);
            return Ok(PaymentEvent::Completed {
                transaction,
                duplicate: true,
            });
        }

        // Step 1: account record
        run.step("ensure_account_exists", || {
            self.accounts.ensure_account(account_id, tenant_id)
        })
        .await?;

        // Step 2: balance as seen by this instance
        run.transition(WorkflowState::Validating);
        let balance = run
            .step("read_balance", || self.balances.fresh(account_id, tenant_id))
            .await?;

        // Step 3: pure funds check, terminal on failure
        let validation = run
            .step("validate", || async {
                Ok(validate(request.kind, request.amount, &balance))
            })
            .await?;
        if let Validation::InsufficientFunds { required, available } = validation {
            return Ok(self
                .reject(&mut run, &request, operation_key, required, available)
                .await);
        }

        // Step 4: conditional insert; the store repeats the funds check
        let mut draft = TransactionDraft::new(
            account_id,
            tenant_id,
            request.amount,
            request.kind,
            operation_key.clone(),
        )
        .with_service_type(request.service_type.clone())
        .with_description(request.description.clone());
        if let Some(serde_json::Value::Object(extra)) = &request.metadata {
            for (key, value) in extra {
                draft = draft.with_meta(key, value.clone());
            }
        }

        let outcome = run
            .step("record_transaction", || {
                let draft = draft.clone();
                async move {
                    match self.ledger.record(draft).await {
                        Ok(recorded) => Ok(RecordOutcome::Recorded(recorded)),
                        Err(AppError::InsufficientFunds { required, available }) => {
                            Ok(RecordOutcome::Rejected { required, available })
                        }
                        Err(err) => Err(err),
                    }
                }
            })
            .await?;

        let recorded = match outcome {
            RecordOutcome::Recorded(recorded) => recorded,
            RecordOutcome::Rejected { required, available } => {
                tracing::warn!(instance = %run.instance_id(), "debit lost a concurrent race");
                return Ok(self
                    .reject(&mut run, &request, operation_key, required, available)
                    .await);
            }
        };
        self.balances.invalidate(account_id, tenant_id).await;
        run.transition(WorkflowState::Recorded);

        // Step 5: best-effort notification, never for a replay
        if !recorded.duplicate {
            run.transition(WorkflowState::Notifying);
            let transaction = &recorded.transaction;
            run.best_effort("notify", || async {
                let balance = self.balances.fresh(account_id, tenant_id).await?;
                self.notifier
                    .notify(
                        account_id,
                        tenant_id,
                        template_for(transaction.kind),
                        serde_json::json!({
                            "amount": transaction.amount,
                            "kind": transaction.kind,
                            "operation_key": transaction.operation_key,
                            "service_type": transaction.service_type,
                            "balance": balance.display_total(),
                        }),
                    )
                    .await
            })
            .await;
        }

        run.transition(WorkflowState::Done);
        Ok(PaymentEvent::Completed {
            transaction: recorded.transaction,
            duplicate: recorded.duplicate,
        })
    }

    async fn reject(
        &self,
        run: &mut WorkflowRun<'_>,
        request: &PaymentProcessRequest,
        operation_key: String,
        required: Decimal,
        available: Decimal,
    ) -> PaymentEvent {
        run.transition(WorkflowState::InsufficientFunds);
        tracing::info!(
            instance = %run.instance_id(),
            %required,
            %available,
            "payment rejected"
        );

        run.best_effort("notify_failure", || {
            self.notifier.notify(
                &request.account_id,
                &request.tenant_id,
                NotificationTemplate::PaymentFailed,
                serde_json::json!({
                    "operation_key": operation_key,
                    "service_type": request.service_type,
                    "required": required,
                    "available": available.max(Decimal::ZERO),
                }),
            )
        })
        .await;

        PaymentEvent::Failed {
            account_id: request.account_id.clone(),
            tenant_id: request.tenant_id.clone(),
            operation_key,
            reason: FailureReason::InsufficientFunds { required, available },
        }
    }
}

fn validate_request(request: &PaymentProcessRequest) -> Result<(), AppError> {
    if request.amount <= Decimal::ZERO {
        return Err(AppError::InvalidRequest("Amount must be positive".to_string()));
    }
    if request.account_id.trim().is_empty() || request.tenant_id.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "account_id and tenant_id are required".to_string(),
        ));
    }
    // Refund rows are written only by the compensation handler, which ties
    // each one to a recorded expense.
    if request.kind == TransactionKind::Refund {
        return Err(AppError::InvalidRequest(
            "refunds go through payment.refund".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn balance(total: Decimal) -> Balance {
        let mut b = Balance::zero();
        b.total = total;
        b
    }

    #[test]
    fn expense_above_balance_is_rejected() {
        assert_eq!(
            validate(TransactionKind::Expense, dec!(150), &balance(dec!(100))),
            Validation::InsufficientFunds {
                required: dec!(150),
                available: dec!(100)
            }
        );
    }

    #[test]
    fn expense_equal_to_balance_is_accepted() {
        assert_eq!(
            validate(TransactionKind::Expense, dec!(100), &balance(dec!(100))),
            Validation::Accepted
        );
    }

    #[test]
    fn credits_are_always_valid() {
        for kind in [
            TransactionKind::Income,
            TransactionKind::Refund,
            TransactionKind::Bonus,
        ] {
            assert_eq!(validate(kind, dec!(1000), &balance(dec!(0))), Validation::Accepted);
        }
    }

    #[test]
    fn templates_follow_kind() {
        assert_eq!(template_for(TransactionKind::Income), NotificationTemplate::TopupCompleted);
        assert_eq!(
            template_for(TransactionKind::SubscriptionPurchase),
            NotificationTemplate::SubscriptionActivated
        );
        assert_eq!(template_for(TransactionKind::Expense), NotificationTemplate::PaymentCompleted);
    }
}
