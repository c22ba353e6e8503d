#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use stars_ledger::error::AppError;
use stars_ledger::models::notification::NotificationTemplate;
use stars_ledger::models::payment::PaymentProcessRequest;
use stars_ledger::models::transaction::TransactionKind;
use stars_ledger::models::webhook::GatewayCallback;
use stars_ledger::services::invoice::GatewaySettings;
use stars_ledger::services::notifier::Notifier;
use stars_ledger::services::pricing::PriceTable;
use stars_ledger::services::retry::RetryPolicy;
use stars_ledger::services::signature;
use stars_ledger::state::{AppState, Settings, Stores};
use stars_ledger::store::memory::{
    InMemoryAccountDirectory, InMemoryIntentStore, InMemoryLedgerStore, InMemoryStepJournal,
};

pub const RESULT_SECRET: &str = "test-result-secret";
pub const API_KEY: &str = "test-internal-key";
pub const TENANT: &str = "neuro_blogger_bot";

/// One delivered notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub account_id: String,
    pub tenant_id: String,
    pub template: NotificationTemplate,
    pub params: serde_json::Value,
}

/// Notifier that records deliveries, optionally failing every call.
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Sent>>>,
    failing: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Arc::default(),
            failing: true,
        }
    }

    pub async fn sent(&self) -> Vec<Sent> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        account_id: &str,
        tenant_id: &str,
        template: NotificationTemplate,
        params: serde_json::Value,
    ) -> Result<(), AppError> {
        if self.failing {
            return Err(AppError::Notify("channel down".to_string()));
        }
        self.sent.lock().await.push(Sent {
            account_id: account_id.to_string(),
            tenant_id: tenant_id.to_string(),
            template,
            params,
        });
        Ok(())
    }
}

/// Application state on in-memory stores, with handles to inspect them.
pub struct TestApp {
    pub state: AppState,
    pub ledger: InMemoryLedgerStore,
    pub intents: InMemoryIntentStore,
    pub accounts: InMemoryAccountDirectory,
    pub journal: InMemoryStepJournal,
    pub notifier: RecordingNotifier,
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        initial_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        multiplier: 2.0,
    }
}

pub fn settings() -> Settings {
    Settings {
        api_key_sha256: hex::encode(Sha256::digest(API_KEY.as_bytes())),
        result_secret: RESULT_SECRET.to_string(),
        gateway: GatewaySettings {
            merchant_login: "stars-shop".to_string(),
            invoice_secret: "test-invoice-secret".to_string(),
            payment_url: "https://pay.example.com/merchant/checkout".to_string(),
        },
        prices: PriceTable::parse("500=217,1000=434,2000=868,5000=2170").unwrap(),
        balance_cache_ttl: Duration::from_secs(60),
        retry_policy: fast_retry(),
    }
}

pub fn test_app() -> TestApp {
    test_app_with(RecordingNotifier::default())
}

pub fn test_app_with(notifier: RecordingNotifier) -> TestApp {
    let ledger = InMemoryLedgerStore::new();
    let intents = InMemoryIntentStore::new();
    let accounts = InMemoryAccountDirectory::new();
    let journal = InMemoryStepJournal::new();

    let stores = Stores {
        ledger: Arc::new(ledger.clone()),
        intents: Arc::new(intents.clone()),
        accounts: Arc::new(accounts.clone()),
        journal: Arc::new(journal.clone()),
    };
    let state = AppState::new(stores, Arc::new(notifier.clone()), settings());

    TestApp {
        state,
        ledger,
        intents,
        accounts,
        journal,
        notifier,
    }
}

pub fn request(account_id: &str, amount: Decimal, kind: TransactionKind, key: &str) -> PaymentProcessRequest {
    PaymentProcessRequest {
        account_id: account_id.to_string(),
        tenant_id: TENANT.to_string(),
        amount,
        kind,
        description: None,
        operation_key: Some(key.to_string()),
        service_type: "neuro_photo".to_string(),
        metadata: None,
    }
}

/// Form fields of a correctly signed gateway callback.
pub fn signed_form(invoice_id: i64, out_sum: &str, shop: &[(&str, &str)]) -> HashMap<String, String> {
    let mut form: HashMap<String, String> = HashMap::new();
    form.insert("OutSum".to_string(), out_sum.to_string());
    form.insert("InvId".to_string(), invoice_id.to_string());
    form.insert("SignatureValue".to_string(), "00".to_string());
    for (k, v) in shop {
        form.insert(k.to_string(), v.to_string());
    }
    let unsigned = GatewayCallback::from_form(&form).unwrap();
    form.insert(
        "SignatureValue".to_string(),
        signature::sign_callback(RESULT_SECRET, &unsigned),
    );
    form
}

pub fn signed_callback(invoice_id: i64, out_sum: &str, shop: &[(&str, &str)]) -> GatewayCallback {
    GatewayCallback::from_form(&signed_form(invoice_id, out_sum, shop)).unwrap()
}

pub fn encode_form(form: &HashMap<String, String>) -> String {
    let sorted: BTreeMap<_, _> = form.iter().collect();
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(sorted)
        .finish()
}
