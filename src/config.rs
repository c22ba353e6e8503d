//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to deserialize environment variables into a type-safe struct.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::services::pricing::PriceTable;
use crate::services::retry::RetryPolicy;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `GATEWAY_MERCHANT_LOGIN`, `GATEWAY_INVOICE_SECRET`, `GATEWAY_RESULT_SECRET`:
///   payment gateway credentials
/// - `INTERNAL_API_KEY_SHA256`: hex SHA-256 of the bearer key used by feature adapters
/// - `PRICE_TABLE`: `"<currency amount>=<stars>,..."`
/// - `BALANCE_CACHE_TTL_MS`: balance projection TTL, `0` disables caching
/// - `RETRY_MAX_ATTEMPTS`, `RETRY_INITIAL_DELAY_MS`, `RETRY_MAX_DELAY_MS`
/// - `NOTIFY_TIMEOUT_SECS`, `NOTIFY_ENDPOINTS` (`"<tenant>=<url>,..."`), `NOTIFY_SECRET`
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default)]
    pub gateway_merchant_login: String,

    #[serde(default)]
    pub gateway_invoice_secret: String,

    #[serde(default)]
    pub gateway_result_secret: String,

    #[serde(default = "default_payment_url")]
    pub gateway_payment_url: String,

    #[serde(default)]
    pub internal_api_key_sha256: String,

    #[serde(default = "default_price_table")]
    pub price_table: String,

    #[serde(default = "default_cache_ttl_ms")]
    pub balance_cache_ttl_ms: u64,

    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    #[serde(default = "default_notify_timeout_secs")]
    pub notify_timeout_secs: u64,

    #[serde(default)]
    pub notify_endpoints: Option<String>,

    #[serde(default)]
    pub notify_secret: Option<String>,
}

fn default_port() -> u16 {
    3000
}

fn default_payment_url() -> String {
    "https://pay.example.com/merchant/checkout".to_string()
}

fn default_price_table() -> String {
    "500=217,1000=434,2000=868,5000=2170".to_string()
}

fn default_cache_ttl_ms() -> u64 {
    2000
}

fn default_retry_max_attempts() -> u32 {
    5
}

fn default_retry_initial_delay_ms() -> u64 {
    200
}

fn default_retry_max_delay_ms() -> u64 {
    5000
}

fn default_notify_timeout_secs() -> u64 {
    5
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or values cannot be
    /// parsed into the expected types.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        envy::from_env::<Config>()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts.max(1),
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            multiplier: 2.0,
        }
    }

    pub fn balance_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.balance_cache_ttl_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }

    pub fn prices(&self) -> anyhow::Result<PriceTable> {
        PriceTable::parse(&self.price_table)
    }

    /// Tenant delivery URLs for notifications, keyed by tenant id.
    pub fn notify_endpoint_map(&self) -> anyhow::Result<HashMap<String, String>> {
        let mut endpoints = HashMap::new();
        let Some(raw) = self.notify_endpoints.as_deref() else {
            return Ok(endpoints);
        };

        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (tenant, url) = pair
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("malformed NOTIFY_ENDPOINTS entry: {pair}"))?;
            url::Url::parse(url.trim())
                .map_err(|e| anyhow::anyhow!("invalid notification url for {tenant}: {e}"))?;
            endpoints.insert(tenant.trim().to_string(), url.trim().to_string());
        }

        Ok(endpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database_url: "postgres://localhost/stars".into(),
            server_port: default_port(),
            gateway_merchant_login: "shop".into(),
            gateway_invoice_secret: "one".into(),
            gateway_result_secret: "two".into(),
            gateway_payment_url: default_payment_url(),
            internal_api_key_sha256: String::new(),
            price_table: default_price_table(),
            balance_cache_ttl_ms: 0,
            retry_max_attempts: 0,
            retry_initial_delay_ms: 10,
            retry_max_delay_ms: 100,
            notify_timeout_secs: 5,
            notify_endpoints: Some("neuro_bot=https://hooks.example.com/a, ai_koshey=http://localhost:9000/b".into()),
            notify_secret: None,
        }
    }

    #[test]
    fn parses_notify_endpoints() {
        let endpoints = config().notify_endpoint_map().unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints["ai_koshey"], "http://localhost:9000/b");
    }

    #[test]
    fn rejects_malformed_endpoint() {
        let mut cfg = config();
        cfg.notify_endpoints = Some("neuro_bot".into());
        assert!(cfg.notify_endpoint_map().is_err());
    }

    #[test]
    fn retry_policy_has_at_least_one_attempt() {
        assert_eq!(config().retry_policy().max_attempts, 1);
    }
}
