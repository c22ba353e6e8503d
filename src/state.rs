//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::config::Config;
use crate::db::DbPool;
use crate::services::balance::BalanceCalculator;
use crate::services::compensation::CompensationHandler;
use crate::services::invoice::{GatewaySettings, InvoiceService};
use crate::services::notifier::Notifier;
use crate::services::pricing::PriceTable;
use crate::services::reconciler::WebhookReconciler;
use crate::services::retry::RetryPolicy;
use crate::services::workflow::PaymentWorkflow;
use crate::store::postgres::{PgAccountDirectory, PgIntentStore, PgLedgerStore, PgStepJournal};
use crate::store::{AccountDirectory, IntentStore, LedgerStore, StepJournal};

/// Storage adapters the services run on.
#[derive(Clone)]
pub struct Stores {
    pub ledger: Arc<dyn LedgerStore>,
    pub intents: Arc<dyn IntentStore>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub journal: Arc<dyn StepJournal>,
}

impl Stores {
    pub fn postgres(pool: DbPool) -> Self {
        Self {
            ledger: Arc::new(PgLedgerStore::new(pool.clone())),
            intents: Arc::new(PgIntentStore::new(pool.clone())),
            accounts: Arc::new(PgAccountDirectory::new(pool.clone())),
            journal: Arc::new(PgStepJournal::new(pool)),
        }
    }
}

/// Settings the state needs beyond the stores.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key_sha256: String,
    pub result_secret: String,
    pub gateway: GatewaySettings,
    pub prices: PriceTable,
    pub balance_cache_ttl: std::time::Duration,
    pub retry_policy: RetryPolicy,
}

impl Settings {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            api_key_sha256: config.internal_api_key_sha256.trim().to_lowercase(),
            result_secret: config.gateway_result_secret.clone(),
            gateway: GatewaySettings {
                merchant_login: config.gateway_merchant_login.clone(),
                invoice_secret: config.gateway_invoice_secret.clone(),
                payment_url: config.gateway_payment_url.clone(),
            },
            prices: config.prices()?,
            balance_cache_ttl: config.balance_cache_ttl(),
            retry_policy: config.retry_policy(),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub workflow: PaymentWorkflow,
    pub compensation: CompensationHandler,
    pub reconciler: WebhookReconciler,
    pub invoices: InvoiceService,
    pub api_key_sha256: Arc<str>,
}

impl AppState {
    pub fn new(stores: Stores, notifier: Arc<dyn Notifier>, settings: Settings) -> Self {
        let balances = BalanceCalculator::new(stores.ledger.clone(), settings.balance_cache_ttl);
        let workflow = PaymentWorkflow::new(
            stores.ledger.clone(),
            stores.accounts.clone(),
            stores.journal.clone(),
            balances,
            notifier,
            settings.retry_policy.clone(),
        );
        let compensation = CompensationHandler::new(workflow.clone());
        let reconciler = WebhookReconciler::new(
            settings.result_secret,
            stores.intents.clone(),
            workflow.clone(),
            settings.retry_policy,
        );
        let invoices = InvoiceService::new(stores.intents.clone(), settings.prices, settings.gateway);

        Self {
            stores,
            workflow,
            compensation,
            reconciler,
            invoices,
            api_key_sha256: Arc::from(settings.api_key_sha256),
        }
    }
}
