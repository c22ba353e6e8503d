//! Keyed signatures (HMAC-SHA256).
//!
//! - Gateway callbacks: hex HMAC over [`GatewayCallback::canonical_string`]
//!   keyed with the result secret. Verification is constant time.
//! - Checkout links: hex HMAC over `MerchantLogin:OutSum:InvId[:Shp_k=v...]`
//!   keyed with the invoice secret.
//! - Outbound notifications: `sha256=<hex>` over the JSON body.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AppError;
use crate::models::webhook::GatewayCallback;

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid")
}

/// Hex HMAC-SHA256 of `message`.
pub fn sign(secret: &str, message: &str) -> String {
    let mut mac = mac_for(secret);
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Check a callback's `SignatureValue`.
///
/// # Errors
///
/// `InvalidSignature` when the value is not hex or does not match, which
/// includes any change to `OutSum`, `InvId` or a `Shp_*` parameter.
pub fn verify_callback(secret: &str, callback: &GatewayCallback) -> Result<(), AppError> {
    let expected = hex::decode(callback.signature.trim()).map_err(|_| AppError::InvalidSignature)?;
    let mut mac = mac_for(secret);
    mac.update(callback.canonical_string().as_bytes());
    mac.verify_slice(&expected)
        .map_err(|_| AppError::InvalidSignature)
}

/// Signature for a gateway callback, as the gateway computes it.
pub fn sign_callback(secret: &str, callback: &GatewayCallback) -> String {
    sign(secret, &callback.canonical_string())
}

/// Signature carried by a checkout link.
pub fn sign_invoice(
    secret: &str,
    merchant_login: &str,
    out_sum: &str,
    invoice_id: i64,
    shop_params: &BTreeMap<String, String>,
) -> String {
    let mut parts = vec![
        merchant_login.to_string(),
        out_sum.to_string(),
        invoice_id.to_string(),
    ];
    parts.extend(shop_params.iter().map(|(k, v)| format!("{k}={v}")));
    sign(secret, &parts.join(":"))
}

/// `sha256=<hex>` header value for an outbound notification body.
pub fn sign_payload(secret: &str, payload: &str) -> String {
    format!("sha256={}", sign(secret, payload))
}
