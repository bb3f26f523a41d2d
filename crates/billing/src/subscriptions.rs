//! Subscription sync
//!
//! Turns a provider subscription into the snapshot embedded in the
//! user document. Invoked from the webhook path on every paid invoice:
//! the snapshot is replaced wholesale and the allowance resets to the
//! full plan amount, which makes redelivery of the same invoice event
//! idempotent.

use std::sync::Arc;

use time::OffsetDateTime;

use suds_shared::store::UserStore;
use suds_shared::{PlanTier, Subscription};

use crate::config::StripeConfig;
use crate::error::{BillingError, BillingResult};
use crate::gateway::{PaymentGateway, ProviderSubscription};

/// Outcome of one sync for logging and webhook responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub customer_id: String,
    pub plan: PlanTier,
}

/// Subscription sync service
pub struct SubscriptionSync {
    gateway: Arc<dyn PaymentGateway>,
    users: Arc<dyn UserStore>,
    config: StripeConfig,
}

impl SubscriptionSync {
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

    /// Refresh the customer's subscription snapshot after a paid
    /// invoice. Retrieves the authoritative subscription from the
    /// provider rather than trusting the event payload.
    pub async fn apply_invoice_paid(&self, subscription_id: &str) -> BillingResult<SyncOutcome> {
        let provider_sub = self.gateway.retrieve_subscription(subscription_id).await?;

        let plan = self
            .config
            .tier_for_price(&provider_sub.price_id)
            .ok_or_else(|| BillingError::UnknownPlan(provider_sub.price_id.clone()))?;

        let snapshot = build_snapshot(&provider_sub, plan)?;
        let customer_id = provider_sub.customer_id;

        let matched = self
            .users
            .set_subscription_by_customer_id(&customer_id, snapshot)
            .await?;
        if !matched {
            return Err(BillingError::NotFound(format!(
                "no user for provider customer {customer_id}"
            )));
        }

        tracing::info!(
            customer_id = %customer_id,
            subscription_id = %subscription_id,
            plan = %plan,
            allowance_lbs = plan.allowance_lbs(),
            "Subscription snapshot replaced"
        );

        Ok(SyncOutcome { customer_id, plan })
    }
}

fn build_snapshot(
    provider_sub: &ProviderSubscription,
    plan: PlanTier,
) -> BillingResult<Subscription> {
    let ts = |unix: i64| {
        OffsetDateTime::from_unix_timestamp(unix)
            .map_err(|_| BillingError::Provider(format!("invalid unix timestamp: {unix}")))
    };

    Ok(Subscription {
        provider_subscription_id: provider_sub.id.clone(),
        plan,
        status: provider_sub.status.clone(),
        lbs_left: plan.allowance_lbs(),
        anchor_date: ts(provider_sub.billing_cycle_anchor)?,
        start_date: ts(provider_sub.start_date)?,
        period_start: ts(provider_sub.current_period_start)?,
        period_end: ts(provider_sub.current_period_end)?,
    })
}
