//! Stripe integration via REST API (no SDK dependency)

use hmac::{Hmac, Mac};
use sha2::Sha256;
use shared::models::{CheckoutSession, UserId};
use thiserror::Error;

/// Signed events older (or newer) than this are rejected
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("gateway rejected the request: {0}")]
    Rejected(String),
}

/// What a checkout pays for. Written into `metadata` so the webhook can find it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTarget {
    Order(i64),
    Reservation(i64),
}

impl PaymentTarget {
    pub fn metadata_key(&self) -> &'static str {
        match self {
            PaymentTarget::Order(_) => "order_id",
            PaymentTarget::Reservation(_) => "reservation_id",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            PaymentTarget::Order(id) | PaymentTarget::Reservation(id) => *id,
        }
    }
}

/// One-off payment in minor units
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub target: PaymentTarget,
    pub user_id: UserId,
    pub amount_cents: i64,
    pub currency: &'a str,
    pub description: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a Stripe Checkout Session (payment mode)
    pub async fn create_checkout_session(
        &self,
        req: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession, GatewayError> {
        let key = req.target.metadata_key();
        let target_id = req.target.id().to_string();
        let user_id = req.user_id.to_string();
        let amount = req.amount_cents.to_string();

        // Metadata goes on both the session and the payment intent so that
        // payment_intent.* and charge.* events carry it too.
        let session_meta = format!("metadata[{key}]");
        let intent_meta = format!("payment_intent_data[metadata][{key}]");
        let form: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("line_items[0][quantity]", "1"),
            ("line_items[0][price_data][currency]", req.currency),
            ("line_items[0][price_data][unit_amount]", amount.as_str()),
            ("line_items[0][price_data][product_data][name]", req.description),
            ("success_url", req.success_url),
            ("cancel_url", req.cancel_url),
            (session_meta.as_str(), target_id.as_str()),
            ("metadata[user_id]", user_id.as_str()),
            (intent_meta.as_str(), target_id.as_str()),
            ("payment_intent_data[metadata][user_id]", user_id.as_str()),
        ];

        let resp: serde_json::Value = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await?
            .json()
            .await?;

        match (resp["id"].as_str(), resp["url"].as_str()) {
            (Some(id), Some(url)) => Ok(CheckoutSession {
                session_id: id.to_string(),
                url: url.to_string(),
            }),
            _ => Err(GatewayError::Rejected(format!(
                "create_checkout_session failed: {resp}"
            ))),
        }
    }

    /// Refund a payment intent in full. Returns the refund id.
    pub async fn create_refund(&self, payment_intent: &str) -> Result<String, GatewayError> {
        let resp: serde_json::Value = self
            .http
            .post(format!("{}/v1/refunds", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[("payment_intent", payment_intent)])
            .send()
            .await?
            .json()
            .await?;

        resp["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| GatewayError::Rejected(format!("create_refund failed: {resp}")))
    }
}

/// Verify Stripe webhook signature (HMAC-SHA256) at unix time `now`
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
    now: i64,
) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signatures = Vec::new();
    for part in sig_header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }

    if timestamp.is_empty() || signatures.is_empty() {
        return Err("Invalid Stripe-Signature header");
    }

    let ts: i64 = timestamp.parse().map_err(|_| "Invalid timestamp")?;
    if now.abs_diff(ts) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err("Webhook timestamp outside tolerance");
    }

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Stripe sends one v1 per active secret during rotation
    let matched = signatures.iter().any(|sig| {
        hex::decode(sig)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });
    if matched {
        Ok(())
    } else {
        Err("Webhook signature mismatch")
    }
}

/// Build a valid `Stripe-Signature` header value
#[cfg(test)]
pub(crate) fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}
