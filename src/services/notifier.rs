//! Notification dispatch to tenant delivery channels.
//!
//! Each tenant (bot/brand) has its own channel. The registry is built once
//! at startup and injected; lookups fall back to a default notifier.
//! Delivery is best effort: callers log failures and carry on.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::notification::{NotificationPayload, NotificationTemplate};
use crate::services::retry::{RetryPolicy, retry};
use crate::services::signature;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        account_id: &str,
        tenant_id: &str,
        template: NotificationTemplate,
        params: serde_json::Value,
    ) -> Result<(), AppError>;
}

/// Tenant id -> notifier, plus a fallback.
#[derive(Clone)]
pub struct NotifierRegistry {
    by_tenant: HashMap<String, Arc<dyn Notifier>>,
    fallback: Arc<dyn Notifier>,
}

impl NotifierRegistry {
    pub fn new(fallback: Arc<dyn Notifier>) -> Self {
        Self {
            by_tenant: HashMap::new(),
            fallback,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>, notifier: Arc<dyn Notifier>) -> Self {
        self.by_tenant.insert(tenant_id.into(), notifier);
        self
    }

    pub fn resolve(&self, tenant_id: &str) -> Arc<dyn Notifier> {
        self.by_tenant
            .get(tenant_id)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Build webhook notifiers for every configured endpoint, logging for the rest.
    pub fn from_endpoints(
        endpoints: &HashMap<String, String>,
        secret: Option<String>,
        timeout: Duration,
        retry_policy: RetryPolicy,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let mut registry = Self::new(Arc::new(LogNotifier));
        for (tenant_id, url) in endpoints {
            let notifier = WebhookNotifier {
                client: client.clone(),
                url: url.clone(),
                secret: secret.clone(),
                retry_policy: retry_policy.clone(),
            };
            registry = registry.with_tenant(tenant_id.clone(), Arc::new(notifier));
        }
        Ok(registry)
    }
}

#[async_trait]
impl Notifier for NotifierRegistry {
    async fn notify(
        &self,
        account_id: &str,
        tenant_id: &str,
        template: NotificationTemplate,
        params: serde_json::Value,
    ) -> Result<(), AppError> {
        self.resolve(tenant_id)
            .notify(account_id, tenant_id, template, params)
            .await
    }
}

/// Writes notifications to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        account_id: &str,
        tenant_id: &str,
        template: NotificationTemplate,
        params: serde_json::Value,
    ) -> Result<(), AppError> {
        tracing::info!(account_id, tenant_id, ?template, %params, "notification");
        Ok(())
    }
}

/// POSTs a signed JSON payload to the tenant's delivery endpoint.
///
/// # Headers Sent
///
/// - `Content-Type: application/json`
/// - `X-Signature: sha256=<hex>` (when a secret is configured)
/// - `X-Event-Id: <uuid>`
///
/// 5xx responses and transport errors are retried; 4xx responses are not.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    secret: Option<String>,
    retry_policy: RetryPolicy,
}

impl WebhookNotifier {
    async fn send_once(&self, payload: &NotificationPayload, body: &str) -> Result<(), AppError> {
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("X-Event-Id", payload.event_id.to_string())
            .body(body.to_string());
        if let Some(secret) = &self.secret {
            request = request.header("X-Signature", signature::sign_payload(secret, body));
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.is_server_error() {
            Err(AppError::Network(format!("{} answered {}", self.url, status)))
        } else {
            Err(AppError::Notify(format!("{} answered {}", self.url, status)))
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(
        &self,
        account_id: &str,
        tenant_id: &str,
        template: NotificationTemplate,
        params: serde_json::Value,
    ) -> Result<(), AppError> {
        let payload = NotificationPayload::new(account_id, tenant_id, template, params);
        let body = serde_json::to_string(&payload)?;

        retry(&self.retry_policy, "notify", || self.send_once(&payload, &body))
            .await
            .map_err(|e| AppError::Notify(e.to_string()))
    }
}
