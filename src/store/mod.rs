//! Storage ports and their adapters.
//!
//! Services only talk to these traits. `postgres` is the production adapter,
//! `memory` keeps everything behind `tokio::sync` locks for tests and local runs.
//!
//! Both adapters implement the expense path of [`LedgerStore::record`] as a
//! single atomic conditional write: the funds check and the insert happen
//! under the same lock/transaction, so concurrent debits for one account
//! cannot overdraw it.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::balance::LedgerTotals;
use crate::models::intent::{NewIntent, PaymentIntent};
use crate::models::transaction::{Recorded, Transaction, TransactionDraft};

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Write a ledger row at most once per (tenant, operation key).
    ///
    /// When a completed row already exists for the key it is returned with
    /// `duplicate = true` and nothing is written. Completed expenses are only
    /// written when the resulting balance stays non-negative, otherwise
    /// `InsufficientFunds` is returned and nothing is written.
    async fn record(&self, draft: TransactionDraft) -> Result<Recorded, AppError>;

    async fn find_by_operation_key(
        &self,
        tenant_id: &str,
        operation_key: &str,
    ) -> Result<Option<Transaction>, AppError>;

    /// Aggregates over completed rows of one account.
    async fn totals(&self, account_id: &str, tenant_id: &str) -> Result<LedgerTotals, AppError>;

    /// Rows of one account, newest first.
    async fn history(
        &self,
        account_id: &str,
        tenant_id: &str,
        limit: i64,
    ) -> Result<Vec<Transaction>, AppError>;

    async fn ping(&self) -> Result<(), AppError>;
}

#[async_trait]
pub trait IntentStore: Send + Sync {
    async fn create(&self, intent: NewIntent) -> Result<PaymentIntent, AppError>;

    async fn find_by_invoice(&self, invoice_id: i64) -> Result<Option<PaymentIntent>, AppError>;

    /// Move a pending intent to completed. Returns false if it was not pending.
    async fn mark_completed(&self, invoice_id: i64) -> Result<bool, AppError>;
}

/// Identity store collaborator, reduced to what the ledger needs.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Create a minimal account record if absent. Returns true when created.
    async fn ensure_account(&self, account_id: &str, tenant_id: &str) -> Result<bool, AppError>;
}

/// Memoized step results of workflow instances.
#[async_trait]
pub trait StepJournal: Send + Sync {
    async fn load(
        &self,
        instance_id: &str,
        step_name: &str,
    ) -> Result<Option<serde_json::Value>, AppError>;

    /// Persist a step result. The first result saved for a key wins.
    async fn save(
        &self,
        instance_id: &str,
        step_name: &str,
        result: &serde_json::Value,
    ) -> Result<(), AppError>;
}
