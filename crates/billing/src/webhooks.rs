//! Stripe webhook handling
//!
//! Verifies the signature header, parses the event envelope, and
//! routes paid invoices to subscription sync. Every other event type
//! is acknowledged and dropped.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

use crate::config::StripeConfig;
use crate::error::{BillingError, BillingResult};
use crate::subscriptions::SubscriptionSync;

type HmacSha256 = Hmac<Sha256>;

/// Allowed clock skew between the signature timestamp and now
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Parsed webhook event envelope
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: Value,
}

/// What happened to a delivered event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookDisposition {
    /// The event mutated billing state
    Processed,
    /// Recognized envelope, no handler for this event type
    Ignored { event_type: String },
}

/// Webhook handler for provider events
pub struct WebhookHandler {
    sync: SubscriptionSync,
    config: StripeConfig,
}

impl WebhookHandler {
    pub fn new(sync: SubscriptionSync, config: StripeConfig) -> Self {
        Self { sync, config }
    }

    /// Verify the signature header and parse the event.
    ///
    /// Signature scheme: the header carries `t=<unix>,v1=<hex>` where
    /// v1 is HMAC-SHA256 of `"{t}.{payload}"` under the endpoint
    /// secret. Without a configured secret the payload is parsed
    /// unverified.
    pub fn verify_event(
        &self,
        payload: &str,
        signature: Option<&str>,
    ) -> BillingResult<WebhookEvent> {
        if let Some(secret) = self.config.webhook_secret.as_deref() {
            let signature = signature.ok_or(BillingError::WebhookSignatureInvalid)?;
            verify_signature(payload, signature, secret)?;
        }

        serde_json::from_str(payload)
            .map_err(|e| BillingError::MalformedEvent(format!("invalid event JSON: {e}")))
    }

    /// Route a verified event to its handler.
    pub async fn handle_event(&self, event: WebhookEvent) -> BillingResult<WebhookDisposition> {
        match event.event_type.as_str() {
            "invoice.payment_succeeded" => {
                let subscription_id = event.data.object["subscription"]
                    .as_str()
                    .ok_or_else(|| {
                        BillingError::MalformedEvent(
                            "invoice event has no subscription id".to_string(),
                        )
                    })?
                    .to_string();

                let outcome = self.sync.apply_invoice_paid(&subscription_id).await?;
                tracing::info!(
                    event_id = event.id.as_deref().unwrap_or("-"),
                    customer_id = %outcome.customer_id,
                    plan = %outcome.plan,
                    "Processed invoice.payment_succeeded"
                );
                Ok(WebhookDisposition::Processed)
            }
            other => {
                tracing::debug!(event_type = %other, "Ignoring unhandled webhook event");
                Ok(WebhookDisposition::Ignored {
                    event_type: other.to_string(),
                })
            }
        }
    }
}

fn verify_signature(payload: &str, signature: &str, secret: &str) -> BillingResult<()> {
    // Header format: t=timestamp,v1=signature[,v0=...]
    let mut timestamp: Option<i64> = None;
    let mut v1_signature: Option<&str> = None;
    for part in signature.split(',') {
        match part.split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => v1_signature = Some(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        tracing::error!("Missing timestamp in signature header");
        BillingError::WebhookSignatureInvalid
    })?;
    let v1_signature = v1_signature.ok_or_else(|| {
        tracing::error!("Missing v1 signature in signature header");
        BillingError::WebhookSignatureInvalid
    })?;

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|_| BillingError::WebhookSignatureInvalid)?
        .as_secs() as i64;
    if (now - timestamp).abs() > TIMESTAMP_TOLERANCE_SECS {
        tracing::error!(
            timestamp,
            now,
            "Webhook timestamp outside tolerance window"
        );
        return Err(BillingError::WebhookSignatureInvalid);
    }

    // The "whsec_" prefix is not part of the key material
    let secret_key = secret.strip_prefix("whsec_").unwrap_or(secret);
    let signed_payload = format!("{timestamp}.{payload}");

    let claimed = hex::decode(v1_signature).map_err(|_| BillingError::WebhookSignatureInvalid)?;

    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|_| BillingError::WebhookSignatureInvalid)?;
    mac.update(signed_payload.as_bytes());

    // Constant-time comparison
    if mac.verify_slice(&claimed).is_err() {
        tracing::error!("Webhook signature mismatch");
        return Err(BillingError::WebhookSignatureInvalid);
    }

    Ok(())
}
