//! PostgreSQL adapters.
//!
//! # Atomicity Guarantees
//!
//! - Credits are a single `INSERT .. ON CONFLICT DO NOTHING` against the
//!   partial unique index on `(tenant_id, operation_key) WHERE status = 'completed'`.
//! - Completed expenses run inside one database transaction that takes a
//!   transaction-scoped advisory lock on `(tenant, account)`, re-aggregates the
//!   balance and inserts only if it stays non-negative. Concurrent debits for
//!   one account are therefore serialized; debits for different accounts are not.
//! - A unique violation means another writer recorded the same key first; the
//!   winner's row is re-fetched and returned as a duplicate.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgExecutor;

use super::{AccountDirectory, IntentStore, LedgerStore, StepJournal};
use crate::db::DbPool;
use crate::error::AppError;
use crate::models::balance::LedgerTotals;
use crate::models::intent::{NewIntent, PaymentIntent};
use crate::models::transaction::{
    Recorded, Transaction, TransactionDraft, TransactionKind, TransactionStatus,
};

const UNIQUE_VIOLATION: &str = "23505";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

fn credit_kinds() -> Vec<String> {
    TransactionKind::CREDITS
        .iter()
        .map(|k| k.as_str().to_string())
        .collect()
}

/// Aggregate completed rows of one account with any executor (pool or open transaction).
async fn totals_with<'e, E: PgExecutor<'e>>(
    executor: E,
    account_id: &str,
    tenant_id: &str,
) -> Result<LedgerTotals, AppError> {
    let (credits, debits, commission): (Decimal, Decimal, Decimal) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(amount) FILTER (WHERE kind = ANY($3)), 0) AS credits,
            COALESCE(SUM(amount) FILTER (WHERE kind = 'expense'), 0) AS debits,
            COALESCE(SUM(
                CASE WHEN metadata->>'commission' ~ '^-?[0-9]+(\.[0-9]+)?$'
                     THEN (metadata->>'commission')::numeric
                END
            ), 0) AS commission
        FROM transactions
        WHERE account_id = $1 AND tenant_id = $2 AND status = 'completed'
        "#,
    )
    .bind(account_id)
    .bind(tenant_id)
    .bind(credit_kinds())
    .fetch_one(executor)
    .await?;

    Ok(LedgerTotals {
        credits,
        debits,
        commission,
    })
}

async fn completed_by_key_with<'e, E: PgExecutor<'e>>(
    executor: E,
    tenant_id: &str,
    operation_key: &str,
) -> Result<Option<Transaction>, AppError> {
    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        WHERE tenant_id = $1 AND operation_key = $2 AND status = 'completed'
        "#,
    )
    .bind(tenant_id)
    .bind(operation_key)
    .fetch_optional(executor)
    .await?;

    Ok(transaction)
}

async fn insert_with<'e, E: PgExecutor<'e>>(
    executor: E,
    row: &Transaction,
    skip_completed_conflict: bool,
) -> Result<Option<Transaction>, sqlx::Error> {
    let sql = if skip_completed_conflict {
        r#"
        INSERT INTO transactions (
            id, account_id, tenant_id, amount, kind, status,
            operation_key, service_type, description, metadata, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (tenant_id, operation_key) WHERE status = 'completed' DO NOTHING
        RETURNING *
        "#
    } else {
        r#"
        INSERT INTO transactions (
            id, account_id, tenant_id, amount, kind, status,
            operation_key, service_type, description, metadata, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#
    };

    sqlx::query_as::<_, Transaction>(sql)
        .bind(row.id)
        .bind(&row.account_id)
        .bind(&row.tenant_id)
        .bind(row.amount)
        .bind(row.kind)
        .bind(row.status)
        .bind(&row.operation_key)
        .bind(&row.service_type)
        .bind(&row.description)
        .bind(&row.metadata)
        .bind(row.created_at)
        .fetch_optional(executor)
        .await
}

/// Ledger backed by the `transactions` table.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: DbPool,
}

impl PgLedgerStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// The row that won a race on the same key.
    async fn winner(&self, tenant_id: &str, operation_key: &str) -> Result<Recorded, AppError> {
        let transaction = completed_by_key_with(&self.pool, tenant_id, operation_key)
            .await?
            .ok_or_else(|| {
                AppError::StorageUnavailable(format!(
                    "conflicting row for {tenant_id}/{operation_key} not visible yet"
                ))
            })?;

        Ok(Recorded {
            transaction,
            duplicate: true,
        })
    }

    async fn record_credit(&self, row: Transaction) -> Result<Recorded, AppError> {
        match insert_with(&self.pool, &row, true).await? {
            Some(transaction) => Ok(Recorded {
                transaction,
                duplicate: false,
            }),
            None => self.winner(&row.tenant_id, &row.operation_key).await,
        }
    }

    async fn record_guarded_debit(&self, row: Transaction) -> Result<Recorded, AppError> {
        let mut tx = self.pool.begin().await?;

        // Serializes debits of one (tenant, account); released at commit/rollback
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("{}:{}", row.tenant_id, row.account_id))
            .execute(&mut *tx)
            .await?;

        if let Some(existing) =
            completed_by_key_with(&mut *tx, &row.tenant_id, &row.operation_key).await?
        {
            tx.rollback().await?;
            return Ok(Recorded {
                transaction: existing,
                duplicate: true,
            });
        }

        let available = totals_with(&mut *tx, &row.account_id, &row.tenant_id)
            .await?
            .net();
        if available - row.amount < Decimal::ZERO {
            tx.rollback().await?;
            return Err(AppError::InsufficientFunds {
                required: row.amount,
                available,
            });
        }

        match insert_with(&mut *tx, &row, false).await {
            Ok(Some(transaction)) => {
                tx.commit().await?;
                Ok(Recorded {
                    transaction,
                    duplicate: false,
                })
            }
            Ok(None) => {
                tx.rollback().await?;
                Err(AppError::StorageUnavailable("insert returned no row".to_string()))
            }
            Err(err) if is_unique_violation(&err) => {
                tx.rollback().await?;
                self.winner(&row.tenant_id, &row.operation_key).await
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn record(&self, draft: TransactionDraft) -> Result<Recorded, AppError> {
        if draft.amount <= Decimal::ZERO {
            return Err(AppError::InvalidRequest("Amount must be positive".to_string()));
        }

        let row = draft.into_transaction();

        if row.status != TransactionStatus::Completed {
            let transaction = insert_with(&self.pool, &row, false)
                .await?
                .ok_or_else(|| AppError::StorageUnavailable("insert returned no row".to_string()))?;
            return Ok(Recorded {
                transaction,
                duplicate: false,
            });
        }

        if row.kind.is_debit() {
            self.record_guarded_debit(row).await
        } else {
            self.record_credit(row).await
        }
    }

    async fn find_by_operation_key(
        &self,
        tenant_id: &str,
        operation_key: &str,
    ) -> Result<Option<Transaction>, AppError> {
        completed_by_key_with(&self.pool, tenant_id, operation_key).await
    }

    async fn totals(&self, account_id: &str, tenant_id: &str) -> Result<LedgerTotals, AppError> {
        totals_with(&self.pool, account_id, tenant_id).await
    }

    async fn history(
        &self,
        account_id: &str,
        tenant_id: &str,
        limit: i64,
    ) -> Result<Vec<Transaction>, AppError> {
        let rows = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE account_id = $1 AND tenant_id = $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(account_id)
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Payment intents backed by the `payment_intents` table.
#[derive(Clone)]
pub struct PgIntentStore {
    pool: DbPool,
}

impl PgIntentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IntentStore for PgIntentStore {
    async fn create(&self, intent: NewIntent) -> Result<PaymentIntent, AppError> {
        let created = sqlx::query_as::<_, PaymentIntent>(
            r#"
            INSERT INTO payment_intents (account_id, tenant_id, amount, stars, kind, service_type)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&intent.account_id)
        .bind(&intent.tenant_id)
        .bind(intent.amount)
        .bind(intent.stars)
        .bind(intent.kind)
        .bind(&intent.service_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_by_invoice(&self, invoice_id: i64) -> Result<Option<PaymentIntent>, AppError> {
        let intent =
            sqlx::query_as::<_, PaymentIntent>("SELECT * FROM payment_intents WHERE invoice_id = $1")
                .bind(invoice_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(intent)
    }

    async fn mark_completed(&self, invoice_id: i64) -> Result<bool, AppError> {
        let updated = sqlx::query(
            r#"
            UPDATE payment_intents
            SET status = 'completed', completed_at = NOW()
            WHERE invoice_id = $1 AND status = 'pending'
            "#,
        )
        .bind(invoice_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }
}

/// Account records backed by the `accounts` table.
#[derive(Clone)]
pub struct PgAccountDirectory {
    pool: DbPool,
}

impl PgAccountDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountDirectory for PgAccountDirectory {
    async fn ensure_account(&self, account_id: &str, tenant_id: &str) -> Result<bool, AppError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO accounts (tenant_id, account_id)
            VALUES ($1, $2)
            ON CONFLICT (tenant_id, account_id) DO NOTHING
            "#,
        )
        .bind(tenant_id)
        .bind(account_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(inserted == 1)
    }
}

/// Step journal backed by the `workflow_steps` table.
#[derive(Clone)]
pub struct PgStepJournal {
    pool: DbPool,
}

impl PgStepJournal {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StepJournal for PgStepJournal {
    async fn load(
        &self,
        instance_id: &str,
        step_name: &str,
    ) -> Result<Option<serde_json::Value>, AppError> {
        let result: Option<serde_json::Value> = sqlx::query_scalar(
            "SELECT result FROM workflow_steps WHERE instance_id = $1 AND step_name = $2",
        )
        .bind(instance_id)
        .bind(step_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn save(
        &self,
        instance_id: &str,
        step_name: &str,
        result: &serde_json::Value,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO workflow_steps (instance_id, step_name, result)
            VALUES ($1, $2, $3)
            ON CONFLICT (instance_id, step_name) DO NOTHING
            "#,
        )
        .bind(instance_id)
        .bind(step_name)
        .bind(result)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
