//! Balance calculator.
//!
//! The balance is always derived from the ledger. A short-TTL projection
//! cache serves read-heavy paths; every write this service performs
//! invalidates the affected entry, and the funds check of a debit never
//! relies on it (the ledger store re-aggregates inside the write).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::error::AppError;
use crate::models::balance::Balance;
use crate::store::LedgerStore;

type CacheKey = (String, String);

/// Cached balances plus a per-key generation bumped by every invalidation.
/// A read only lands in the cache if no invalidation happened while it ran.
#[derive(Default)]
struct Projection {
    entries: HashMap<CacheKey, (Instant, Balance)>,
    generations: HashMap<CacheKey, u64>,
}

impl Projection {
    fn generation(&self, key: &CacheKey) -> u64 {
        self.generations.get(key).copied().unwrap_or(0)
    }
}

#[derive(Clone)]
pub struct BalanceCalculator {
    ledger: Arc<dyn LedgerStore>,
    ttl: Duration,
    cache: Arc<RwLock<Projection>>,
}

impl BalanceCalculator {
    /// `ttl` of zero disables caching.
    pub fn new(ledger: Arc<dyn LedgerStore>, ttl: Duration) -> Self {
        Self {
            ledger,
            ttl,
            cache: Arc::new(RwLock::new(Projection::default())),
        }
    }

    fn key(account_id: &str, tenant_id: &str) -> CacheKey {
        (tenant_id.to_string(), account_id.to_string())
    }

    /// Balance straight from the ledger, refreshing the projection.
    pub async fn fresh(&self, account_id: &str, tenant_id: &str) -> Result<Balance, AppError> {
        let key = Self::key(account_id, tenant_id);
        let generation = self.cache.read().await.generation(&key);

        let balance: Balance = self.ledger.totals(account_id, tenant_id).await?.into();
        if !self.ttl.is_zero() {
            self.store_if_current(key, generation, balance).await;
        }
        Ok(balance)
    }

    /// Cache `balance` unless the key was invalidated after `generation` was read.
    async fn store_if_current(&self, key: CacheKey, generation: u64, balance: Balance) -> bool {
        let mut cache = self.cache.write().await;
        if cache.generation(&key) != generation {
            tracing::debug!(tenant_id = %key.0, account_id = %key.1, "stale balance read not cached");
            return false;
        }
        cache.entries.insert(key, (Instant::now(), balance));
        true
    }

    /// Balance for display paths; may be up to `ttl` old.
    pub async fn balance(&self, account_id: &str, tenant_id: &str) -> Result<Balance, AppError> {
        if !self.ttl.is_zero() {
            let cache = self.cache.read().await;
            if let Some((at, balance)) = cache.entries.get(&Self::key(account_id, tenant_id)) {
                if at.elapsed() < self.ttl {
                    return Ok(*balance);
                }
            }
        }
        self.fresh(account_id, tenant_id).await
    }

    /// Drop the projection after a write.
    pub async fn invalidate(&self, account_id: &str, tenant_id: &str) {
        if !self.ttl.is_zero() {
            let key = Self::key(account_id, tenant_id);
            let mut cache = self.cache.write().await;
            cache.entries.remove(&key);
            *cache.generations.entry(key).or_default() += 1;
        }
    }
}
