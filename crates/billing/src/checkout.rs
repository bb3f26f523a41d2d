//! Checkout flows
//!
//! Hosted checkout for starting a subscription, plus setup intents for
//! collecting a card without charging it.

use std::sync::Arc;

use serde::Serialize;

use suds_shared::store::UserStore;
use suds_shared::{PlanTier, User};

use crate::config::StripeConfig;
use crate::error::{BillingError, BillingResult};
use crate::gateway::PaymentGateway;

/// Client-facing checkout session handle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

/// Client-facing setup intent handle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupResponse {
    pub client_secret: String,
}

/// Checkout service
pub struct CheckoutService {
    gateway: Arc<dyn PaymentGateway>,
    users: Arc<dyn UserStore>,
    config: StripeConfig,
}

impl CheckoutService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        users: Arc<dyn UserStore>,
        config: StripeConfig,
    ) -> Self {
        Self {
            gateway,
            users,
            config,
        }
    }

    /// Start a subscription checkout for the given plan tier.
    pub async fn create_subscription_checkout(
        &self,
        customer_email: &str,
        tier: PlanTier,
    ) -> BillingResult<CheckoutResponse> {
        let user = self.ensure_customer(customer_email).await?;
        let session = self
            .gateway
            .create_checkout_session(
                &user.customer_id,
                self.config.price_for_tier(tier),
                &self.config.success_url,
                &self.config.cancel_url,
            )
            .await?;

        tracing::info!(
            customer = %customer_email,
            plan = %tier,
            session_id = %session.id,
            "Checkout session created"
        );

        Ok(CheckoutResponse {
            session_id: session.id,
            url: session.url,
        })
    }

    /// Create a setup intent so the client can collect a card.
    pub async fn create_setup_intent(&self, customer_email: &str) -> BillingResult<SetupResponse> {
        let user = self.ensure_customer(customer_email).await?;
        let intent = self.gateway.create_setup_intent(&user.customer_id).await?;
        Ok(SetupResponse {
            client_secret: intent.client_secret,
        })
    }

    /// Look up the user, creating the provider-side customer record on
    /// first contact with billing.
    async fn ensure_customer(&self, customer_email: &str) -> BillingResult<User> {
        if let Some(user) = self.users.get_by_email(customer_email).await? {
            return Ok(user);
        }

        let customer_id = self.gateway.create_customer(customer_email).await?;
        let user = User::new(customer_email, customer_id);
        self.users.upsert(user.clone()).await?;
        tracing::info!(
            customer = %customer_email,
            customer_id = %user.customer_id,
            "Provider customer created"
        );
        Ok(user)
    }

    /// Resolve a client-supplied plan name ("Student", "Family", ...)
    pub fn parse_tier(name: &str) -> BillingResult<PlanTier> {
        name.parse()
            .map_err(|_| BillingError::UnknownPlan(name.to_string()))
    }
}
