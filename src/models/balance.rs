//! Balance models derived from the ledger.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::models::transaction::{Transaction, TransactionStatus};

/// Aggregates over the completed rows of one (account, tenant).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    /// Σ completed credit kinds
    pub credits: Decimal,
    /// Σ completed expenses
    pub debits: Decimal,
    /// Σ `metadata.commission` on completed rows
    pub commission: Decimal,
}

impl LedgerTotals {
    /// Fold rows in memory. Rows that are not completed are ignored.
    pub fn from_transactions<'a>(rows: impl IntoIterator<Item = &'a Transaction>) -> Self {
        rows.into_iter()
            .filter(|tx| tx.status == TransactionStatus::Completed)
            .fold(Self::default(), |mut acc, tx| {
                if tx.kind.is_credit() {
                    acc.credits += tx.amount;
                } else if tx.kind.is_debit() {
                    acc.debits += tx.amount;
                }
                if let Some(fee) = tx.metadata_decimal("commission") {
                    acc.commission += fee;
                }
                acc
            })
    }

    pub fn net(&self) -> Decimal {
        self.credits - self.debits
    }
}

/// Balance of one (account, tenant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// income − outcome, full precision
    pub total: Decimal,
    pub income: Decimal,
    pub outcome: Decimal,
    pub commission: Decimal,
}

impl From<LedgerTotals> for Balance {
    fn from(totals: LedgerTotals) -> Self {
        Self {
            total: totals.net(),
            income: totals.credits,
            outcome: totals.debits,
            commission: totals.commission,
        }
    }
}

impl Balance {
    pub fn zero() -> Self {
        LedgerTotals::default().into()
    }

    /// Total for display: floored at zero, half-up to 2 decimals.
    pub fn display_total(&self) -> Decimal {
        self.total
            .max(Decimal::ZERO)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

/// Balance response body.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account_id: String,
    pub tenant_id: String,
    pub total: Decimal,
    pub display_total: Decimal,
    pub income: Decimal,
    pub outcome: Decimal,
    pub commission: Decimal,
}

impl BalanceResponse {
    pub fn new(account_id: String, tenant_id: String, balance: Balance) -> Self {
        Self {
            account_id,
            tenant_id,
            total: balance.total,
            display_total: balance.display_total(),
            income: balance.income,
            outcome: balance.outcome,
            commission: balance.commission,
        }
    }
}
