//! In-memory adapters.
//!
//! Every store keeps its state behind one `tokio::sync::Mutex`, which makes
//! each operation atomic with respect to the others. Suitable for tests and
//! single-process local runs; nothing survives a restart.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::{AccountDirectory, IntentStore, LedgerStore, StepJournal};
use crate::error::AppError;
use crate::models::balance::LedgerTotals;
use crate::models::intent::{IntentStatus, NewIntent, PaymentIntent};
use crate::models::transaction::{Recorded, Transaction, TransactionDraft, TransactionStatus};

#[derive(Default)]
struct LedgerState {
    rows: Vec<Transaction>,
    /// (tenant, operation key) -> index of the completed row
    completed: HashMap<(String, String), usize>,
}

impl LedgerState {
    fn completed_by_key(&self, tenant_id: &str, operation_key: &str) -> Option<&Transaction> {
        self.completed
            .get(&(tenant_id.to_string(), operation_key.to_string()))
            .map(|&idx| &self.rows[idx])
    }

    fn account_rows<'a>(
        &'a self,
        account_id: &'a str,
        tenant_id: &'a str,
    ) -> impl DoubleEndedIterator<Item = &'a Transaction> + 'a {
        self.rows
            .iter()
            .filter(move |tx| tx.account_id == account_id && tx.tenant_id == tenant_id)
    }
}

/// Thread-safe in-memory ledger.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
    failures: Arc<AtomicU32>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` store calls fail with `StorageUnavailable`.
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Number of rows written, all statuses.
    pub async fn len(&self) -> usize {
        self.state.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn injected_failure(&self) -> Result<(), AppError> {
        let took = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took {
            return Err(AppError::StorageUnavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn record(&self, draft: TransactionDraft) -> Result<Recorded, AppError> {
        self.injected_failure()?;

        if draft.amount <= Decimal::ZERO {
            return Err(AppError::InvalidRequest("Amount must be positive".to_string()));
        }

        let mut state = self.state.lock().await;

        if let Some(existing) = state.completed_by_key(&draft.tenant_id, &draft.operation_key) {
            return Ok(Recorded {
                transaction: existing.clone(),
                duplicate: true,
            });
        }

        if draft.status == TransactionStatus::Completed && draft.kind.is_debit() {
            let available =
                LedgerTotals::from_transactions(state.account_rows(&draft.account_id, &draft.tenant_id))
                    .net();
            if available - draft.amount < Decimal::ZERO {
                return Err(AppError::InsufficientFunds {
                    required: draft.amount,
                    available,
                });
            }
        }

        let transaction = draft.into_transaction();
        state.rows.push(transaction.clone());
        if transaction.status == TransactionStatus::Completed {
            let idx = state.rows.len() - 1;
            state.completed.insert(
                (transaction.tenant_id.clone(), transaction.operation_key.clone()),
                idx,
            );
        }

        Ok(Recorded {
            transaction,
            duplicate: false,
        })
    }

    async fn find_by_operation_key(
        &self,
        tenant_id: &str,
        operation_key: &str,
    ) -> Result<Option<Transaction>, AppError> {
        self.injected_failure()?;
        let state = self.state.lock().await;
        Ok(state.completed_by_key(tenant_id, operation_key).cloned())
    }

    async fn totals(&self, account_id: &str, tenant_id: &str) -> Result<LedgerTotals, AppError> {
        self.injected_failure()?;
        let state = self.state.lock().await;
        Ok(LedgerTotals::from_transactions(state.account_rows(account_id, tenant_id)))
    }

    async fn history(
        &self,
        account_id: &str,
        tenant_id: &str,
        limit: i64,
    ) -> Result<Vec<Transaction>, AppError> {
        self.injected_failure()?;
        let state = self.state.lock().await;
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(state
            .account_rows(account_id, tenant_id)
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[derive(Default)]
struct IntentState {
    next_id: i64,
    intents: HashMap<i64, PaymentIntent>,
}

/// Thread-safe in-memory payment intents.
#[derive(Default, Clone)]
pub struct InMemoryIntentStore {
    state: Arc<Mutex<IntentState>>,
}

impl InMemoryIntentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntentStore for InMemoryIntentStore {
    async fn create(&self, intent: NewIntent) -> Result<PaymentIntent, AppError> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let created = PaymentIntent {
            invoice_id: state.next_id,
            account_id: intent.account_id,
            tenant_id: intent.tenant_id,
            amount: intent.amount,
            stars: intent.stars,
            kind: intent.kind,
            service_type: intent.service_type,
            status: IntentStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        };
        state.intents.insert(created.invoice_id, created.clone());
        Ok(created)
    }

    async fn find_by_invoice(&self, invoice_id: i64) -> Result<Option<PaymentIntent>, AppError> {
        let state = self.state.lock().await;
        Ok(state.intents.get(&invoice_id).cloned())
    }

    async fn mark_completed(&self, invoice_id: i64) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        match state.intents.get_mut(&invoice_id) {
            Some(intent) if intent.status == IntentStatus::Pending => {
                intent.status = IntentStatus::Completed;
                intent.completed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Thread-safe in-memory account directory.
#[derive(Default, Clone)]
pub struct InMemoryAccountDirectory {
    accounts: Arc<Mutex<HashSet<(String, String)>>>,
}

impl InMemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, account_id: &str, tenant_id: &str) -> bool {
        self.accounts
            .lock()
            .await
            .contains(&(tenant_id.to_string(), account_id.to_string()))
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn ensure_account(&self, account_id: &str, tenant_id: &str) -> Result<bool, AppError> {
        let mut accounts = self.accounts.lock().await;
        Ok(accounts.insert((tenant_id.to_string(), account_id.to_string())))
    }
}

/// Thread-safe in-memory step journal.
#[derive(Default, Clone)]
pub struct InMemoryStepJournal {
    steps: Arc<Mutex<HashMap<(String, String), serde_json::Value>>>,
}

impl InMemoryStepJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.steps.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl StepJournal for InMemoryStepJournal {
    async fn load(
        &self,
        instance_id: &str,
        step_name: &str,
    ) -> Result<Option<serde_json::Value>, AppError> {
        let steps = self.steps.lock().await;
        Ok(steps
            .get(&(instance_id.to_string(), step_name.to_string()))
            .cloned())
    }

    async fn save(
        &self,
        instance_id: &str,
        step_name: &str,
        result: &serde_json::Value,
    ) -> Result<(), AppError> {
        let mut steps = self.steps.lock().await;
        steps
            .entry((instance_id.to_string(), step_name.to_string()))
            .or_insert_with(|| result.clone());
        Ok(())
    }
}
