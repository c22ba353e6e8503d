//! Payment gateway callback model.
//!
//! The gateway posts a form-encoded callback to the result URL once an
//! invoice is paid:
//!
//! ```text
//! OutSum=500.000000&InvId=1042&SignatureValue=9f86...&Shp_tenant=neuro_bot&Shp_account=144022504
//! ```
//!
//! `SignatureValue` is a keyed hash over the canonical string built by
//! [`GatewayCallback::canonical_string`].

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;

use crate::error::AppError;

pub const FIELD_OUT_SUM: &str = "OutSum";
pub const FIELD_INV_ID: &str = "InvId";
pub const FIELD_SIGNATURE: &str = "SignatureValue";
const SHOP_PARAM_PREFIX: &str = "shp_";

/// A parsed, not yet verified, gateway callback.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayCallback {
    pub invoice_id: i64,
    /// `InvId` exactly as sent (signed form)
    pub invoice_id_raw: String,
    pub out_sum: Decimal,
    /// `OutSum` exactly as sent (signed form)
    pub out_sum_raw: String,
    pub signature: String,
    /// `Shp_*` parameters, sorted by name
    pub shop_params: BTreeMap<String, String>,
}

impl GatewayCallback {
    /// Parse the callback form.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` when a declared field is missing or unparsable.
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self, AppError> {
        // Signed fields are kept byte for byte; only the parsed copies are trimmed
        let field = |name: &str| {
            form.get(name)
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .ok_or_else(|| AppError::InvalidRequest(format!("missing {name}")))
        };

        let out_sum_raw = field(FIELD_OUT_SUM)?;
        let invoice_id_raw = field(FIELD_INV_ID)?;
        let signature = field(FIELD_SIGNATURE)?.trim().to_string();

        let out_sum: Decimal = out_sum_raw
            .trim()
            .parse()
            .map_err(|_| AppError::InvalidRequest(format!("unparsable {FIELD_OUT_SUM}")))?;
        let invoice_id: i64 = invoice_id_raw
            .trim()
            .parse()
            .map_err(|_| AppError::InvalidRequest(format!("unparsable {FIELD_INV_ID}")))?;

        let shop_params = form
            .iter()
            .filter(|(k, _)| k.to_ascii_lowercase().starts_with(SHOP_PARAM_PREFIX))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            invoice_id,
            invoice_id_raw,
            out_sum,
            out_sum_raw,
            signature,
            shop_params,
        })
    }

    /// `OutSum:InvId[:Shp_a=x:Shp_b=y...]` with shop parameters sorted by name.
    pub fn canonical_string(&self) -> String {
        let mut parts = vec![self.out_sum_raw.clone(), self.invoice_id_raw.clone()];
        parts.extend(self.shop_params.iter().map(|(k, v)| format!("{k}={v}")));
        parts.join(":")
    }

    /// Acknowledgement body the gateway expects.
    pub fn ack(&self) -> String {
        format!("OK{}", self.invoice_id_raw.trim())
    }

    pub fn shop_param(&self, name: &str) -> Option<&str> {
        self.shop_params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
