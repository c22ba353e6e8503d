mod common;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use common::{TENANT, request, test_app};
use stars_ledger::models::balance::LedgerTotals;
use stars_ledger::models::payment::{PaymentEvent, RefundRequest};
use stars_ledger::models::transaction::TransactionKind;
use stars_ledger::store::LedgerStore;

const ACCOUNTS: [&str; 3] = ["1001", "1002", "1003"];

/// Random mix of credits, debits, replays and refunds against a running
/// model of each account's balance.
async fn run_sequence(seed: u64, steps: usize) {
    let mut rng = StdRng::seed_from_u64(seed);
    let app = test_app();
    let workflow = &app.state.workflow;

    let mut expected: [Decimal; 3] = [Decimal::ZERO; 3];
    let mut issued: Vec<(usize, String, TransactionKind, Decimal)> = Vec::new();
    let mut expenses: Vec<String> = Vec::new();
    let mut refunded: Vec<String> = Vec::new();
    let mut rows = 0usize;

    for step in 0..steps {
        let roll = rng.random_range(0..100);

        if roll < 15 && !issued.is_empty() {
            // Replay an earlier operation key
            let (idx, key, kind, amount) = issued[rng.random_range(0..issued.len())].clone();
            let event = workflow
                .process(request(ACCOUNTS[idx], amount, kind, &key))
                .await
                .unwrap();
            if let PaymentEvent::Completed { duplicate, .. } = event {
                assert!(duplicate, "seed {seed} step {step}: replay of {key} wrote a row");
            }
            continue;
        }

        if roll < 25 && !expenses.is_empty() {
            let key = expenses[rng.random_range(0..expenses.len())].clone();
            let refund = app
                .state
                .compensation
                .refund(RefundRequest {
                    original_operation_key: key.clone(),
                    tenant_id: TENANT.to_string(),
                    reason: "downstream failure".to_string(),
                })
                .await
                .unwrap();
            if !refunded.contains(&key) {
                let idx = ACCOUNTS.iter().position(|a| *a == refund.account_id).unwrap();
                expected[idx] += refund.amount;
                refunded.push(key);
                rows += 1;
            }
            continue;
        }

        let idx = rng.random_range(0..ACCOUNTS.len());
        let amount = Decimal::new(rng.random_range(1..=5_000), 2);
        let kind = match rng.random_range(0..4) {
            0 => TransactionKind::Income,
            1 => TransactionKind::Bonus,
            _ => TransactionKind::Expense,
        };
        let key = format!("op-{seed}-{step}");

        let event = workflow
            .process(request(ACCOUNTS[idx], amount, kind, &key))
            .await
            .unwrap();
        match event {
            PaymentEvent::Completed { duplicate, .. } => {
                assert!(!duplicate);
                if kind.is_debit() {
                    assert!(amount <= expected[idx], "seed {seed} step {step}: overdraft accepted");
                    expected[idx] -= amount;
                    expenses.push(key.clone());
                } else {
                    expected[idx] += amount;
                }
                rows += 1;
                issued.push((idx, key, kind, amount));
            }
            PaymentEvent::Failed { .. } => {
                assert!(kind.is_debit());
                assert!(amount > expected[idx], "seed {seed} step {step}: payable expense rejected");
            }
        }
    }

    assert_eq!(app.ledger.len().await, rows, "seed {seed}");
    for (idx, account) in ACCOUNTS.iter().enumerate() {
        let totals = app.ledger.totals(account, TENANT).await.unwrap();
        assert_eq!(totals.net(), expected[idx], "seed {seed} account {account}");
        assert!(totals.net() >= Decimal::ZERO);

        let history = app.ledger.history(account, TENANT, 10_000).await.unwrap();
        assert_eq!(LedgerTotals::from_transactions(&history), totals);
    }
}

#[tokio::test]
async fn test_random_sequences_conserve_balance() {
    for seed in [1, 7, 42, 2026, 31337] {
        run_sequence(seed, 200).await;
    }
}
