//! Invoice issuing: creates pending payment intents and signed checkout links.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::error::AppError;
use crate::models::intent::{CreateIntentRequest, CreateIntentResponse, NewIntent};
use crate::models::transaction::TransactionKind;
use crate::services::pricing::PriceTable;
use crate::services::signature;
use crate::store::IntentStore;

/// Gateway merchant settings used to build checkout links.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub merchant_login: String,
    pub invoice_secret: String,
    pub payment_url: String,
}

#[derive(Clone)]
pub struct InvoiceService {
    intents: Arc<dyn IntentStore>,
    prices: PriceTable,
    gateway: GatewaySettings,
}

impl InvoiceService {
    pub fn new(intents: Arc<dyn IntentStore>, prices: PriceTable, gateway: GatewaySettings) -> Self {
        Self {
            intents,
            prices,
            gateway,
        }
    }

    /// Create a pending intent priced from the table and return its checkout link.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` when the amount is not in the price table or identifiers are empty.
    pub async fn create(&self, request: CreateIntentRequest) -> Result<CreateIntentResponse, AppError> {
        if request.account_id.trim().is_empty() || request.tenant_id.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "account_id and tenant_id are required".to_string(),
            ));
        }
        let stars = self.prices.stars_for(request.amount).ok_or_else(|| {
            AppError::InvalidRequest(format!("no price for amount {}", request.amount))
        })?;

        let (kind, service_type) = match request.subscription {
            Some(subscription) if !subscription.trim().is_empty() => {
                (TransactionKind::SubscriptionPurchase, subscription)
            }
            _ => (TransactionKind::Income, "topup".to_string()),
        };

        let intent = self
            .intents
            .create(NewIntent {
                account_id: request.account_id,
                tenant_id: request.tenant_id,
                amount: request.amount,
                stars,
                kind,
                service_type,
            })
            .await?;

        tracing::info!(
            invoice_id = intent.invoice_id,
            account_id = %intent.account_id,
            tenant_id = %intent.tenant_id,
            amount = %intent.amount,
            %stars,
            "payment intent created"
        );

        let payment_url = self.checkout_url(
            intent.invoice_id,
            intent.amount,
            &intent.account_id,
            &intent.tenant_id,
            request.description.as_deref().unwrap_or("Stars top-up"),
        )?;

        Ok(CreateIntentResponse {
            invoice_id: intent.invoice_id,
            amount: intent.amount,
            stars: intent.stars,
            kind: intent.kind,
            status: intent.status,
            payment_url,
        })
    }

    fn checkout_url(
        &self,
        invoice_id: i64,
        amount: Decimal,
        account_id: &str,
        tenant_id: &str,
        description: &str,
    ) -> Result<String, AppError> {
        let out_sum = amount.to_string();
        let shop_params = BTreeMap::from([
            ("Shp_account".to_string(), account_id.to_string()),
            ("Shp_tenant".to_string(), tenant_id.to_string()),
        ]);
        let signature = signature::sign_invoice(
            &self.gateway.invoice_secret,
            &self.gateway.merchant_login,
            &out_sum,
            invoice_id,
            &shop_params,
        );

        let mut url = url::Url::parse(&self.gateway.payment_url)
            .map_err(|e| AppError::InvalidRequest(format!("bad gateway url: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("MerchantLogin", &self.gateway.merchant_login)
                .append_pair("OutSum", &out_sum)
                .append_pair("InvId", &invoice_id.to_string())
                .append_pair("Description", description)
                .append_pair("SignatureValue", &signature);
            for (key, value) in &shop_params {
                query.append_pair(key, value);
            }
        }
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryIntentStore;
    use rust_decimal_macros::dec;

    fn service() -> InvoiceService {
        InvoiceService::new(
            Arc::new(InMemoryIntentStore::new()),
            PriceTable::from_pairs([(dec!(500), dec!(217))]),
            GatewaySettings {
                merchant_login: "shop".into(),
                invoice_secret: "one".into(),
                payment_url: "https://pay.example.com/checkout".into(),
            },
        )
    }

    fn request(amount: Decimal, subscription: Option<&str>) -> CreateIntentRequest {
        CreateIntentRequest {
            account_id: "144022504".into(),
            tenant_id: "neuro_bot".into(),
            amount,
            subscription: subscription.map(String::from),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_topup_intent_is_priced_and_linked() {
        let created = service().create(request(dec!(500), None)).await.unwrap();

        assert_eq!(created.stars, dec!(217));
        assert_eq!(created.kind, TransactionKind::Income);
        assert!(created.payment_url.contains("OutSum=500"));
        assert!(created.payment_url.contains(&format!("InvId={}", created.invoice_id)));
        assert!(created.payment_url.contains("Shp_tenant=neuro_bot"));
    }

    #[tokio::test]
    async fn test_subscription_intent_kind() {
        let created = service()
            .create(request(dec!(500), Some("neurophoto")))
            .await
            .unwrap();
        assert_eq!(created.kind, TransactionKind::SubscriptionPurchase);
    }

    #[tokio::test]
    async fn test_unpriced_amount_is_rejected() {
        let err = service().create(request(dec!(123), None)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }
}
