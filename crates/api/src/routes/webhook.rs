//! Provider webhook endpoint
//!
//! The raw body is needed for signature verification, so this handler
//! takes the payload as a string rather than parsed JSON. Events for
//! customers we do not know are acknowledged with 200 after logging:
//! redelivery would fail the same way.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::json;

use suds_billing::{BillingError, WebhookDisposition};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    let event = state.billing.webhooks.verify_event(&body, signature)?;

    match state.billing.webhooks.handle_event(event).await {
        Ok(WebhookDisposition::Processed) => Ok(Json(json!({ "received": true }))),
        Ok(WebhookDisposition::Ignored { event_type }) => {
            Ok(Json(json!({ "received": true, "ignored": event_type })))
        }
        Err(BillingError::NotFound(what)) => {
            tracing::error!(%what, "Webhook referenced an unknown record; acknowledging anyway");
            Ok(Json(json!({ "received": true })))
        }
        Err(e) => Err(e.into()),
    }
}
