//! Billing routes
//!
//! Checkout, card setup, payment method management, and the hosted
//! billing portal. All of these act on the requesting customer.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use suds_billing::{
    CheckoutResponse, CheckoutService, PaymentMethodSwap, PortalResponse, SetupResponse,
};

use crate::error::ApiError;
use crate::extract::Actor;
use crate::state::AppState;

pub async fn setup_intent(
    State(state): State<AppState>,
    Actor(actor): Actor,
) -> Result<Json<SetupResponse>, ApiError> {
    let response = state.billing.checkout.create_setup_intent(&actor.email).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    plan: String,
}

pub async fn checkout(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let tier = CheckoutService::parse_tier(&body.plan)?;
    let response = state
        .billing
        .checkout
        .create_subscription_checkout(&actor.email, tier)
        .await?;
    Ok(Json(response))
}

pub async fn portal(
    State(state): State<AppState>,
    Actor(actor): Actor,
) -> Result<Json<PortalResponse>, ApiError> {
    let response = state.billing.portal.create_session(&actor.email).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplacePaymentMethodBody {
    payment_method_id: String,
}

pub async fn replace_payment_method(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(body): Json<ReplacePaymentMethodBody>,
) -> Result<Json<PaymentMethodSwap>, ApiError> {
    let swap = state
        .billing
        .customer
        .replace_payment_method(&actor.email, body.payment_method_id)
        .await?;
    Ok(Json(swap))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardResponse {
    brand: String,
    last4: String,
    exp_month: u8,
    exp_year: u16,
}

pub async fn card_details(
    State(state): State<AppState>,
    Actor(actor): Actor,
) -> Result<Json<CardResponse>, ApiError> {
    let card = state.billing.customer.card_details(&actor.email).await?;
    Ok(Json(CardResponse {
        brand: card.brand,
        last4: card.last4,
        exp_month: card.exp_month,
        exp_year: card.exp_year,
    }))
}
