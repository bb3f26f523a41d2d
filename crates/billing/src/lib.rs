// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Suds Billing Module
//!
//! Stripe integration for the laundry service: usage-metered charges
//! at weigh-in, subscription allowance sync from webhooks, checkout,
//! and payment method management.
//!
//! ## Features
//!
//! - **Metering**: split a measured load between the prepaid plan
//!   allowance and the billable overage
//! - **Reconciliation**: charge the overage, then deduct the allowance
//! - **Subscriptions**: reset the allowance snapshot on every paid
//!   invoice delivered by webhook
//! - **Checkout**: hosted subscription checkout and card setup
//! - **Portal**: provider-hosted billing self-service
//! - **Webhooks**: signature verification and event routing

pub mod checkout;
pub mod config;
pub mod customer;
pub mod error;
pub mod gateway;
pub mod metering;
pub mod portal;
pub mod reconciler;
pub mod subscriptions;
pub mod webhooks;

#[cfg(test)]
mod edge_case_tests;

// Checkout
pub use checkout::{CheckoutResponse, CheckoutService, SetupResponse};

// Config
pub use config::{PriceIds, StripeConfig};

// Customer
pub use customer::{CustomerService, PaymentMethodSwap};

// Error
pub use error::{BillingError, BillingResult};

// Gateway
pub use gateway::{
    CardDetails, CheckoutSession, PaymentGateway, PortalSession, ProviderSubscription,
    SetupIntent, StripeGateway,
};

// Metering
pub use metering::{ChargeInstruction, MeteringEngine, PricingPolicy, UNIT_PRICE_CENTS_PER_LB};

// Portal
pub use portal::{PortalResponse, PortalService};

// Reconciler
pub use reconciler::BillingReconciler;

// Subscriptions
pub use subscriptions::{SubscriptionSync, SyncOutcome};

// Webhooks
pub use webhooks::{WebhookDisposition, WebhookEvent, WebhookHandler};

use std::sync::Arc;

use suds_shared::store::UserStore;

/// Main billing service that combines all billing functionality
pub struct BillingService {
    pub checkout: CheckoutService,
    pub customer: CustomerService,
    pub portal: PortalService,
    /// Shared with the order state machine as its weigh-in processor
    pub reconciler: Arc<BillingReconciler>,
    pub webhooks: WebhookHandler,
}

impl BillingService {
    /// Create a new billing service from environment variables
    pub fn from_env(users: Arc<dyn UserStore>) -> BillingResult<Self> {
        let config = StripeConfig::from_env()?;
        Ok(Self::new(config, users))
    }

    /// Create a new billing service with explicit config
    pub fn new(config: StripeConfig, users: Arc<dyn UserStore>) -> Self {
        let gateway: Arc<dyn PaymentGateway> = Arc::new(StripeGateway::new(config.clone()));
        Self::with_gateway(config, gateway, users)
    }

    /// Create a billing service over an explicit gateway (tests)
    pub fn with_gateway(
        config: StripeConfig,
        gateway: Arc<dyn PaymentGateway>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            checkout: CheckoutService::new(gateway.clone(), users.clone(), config.clone()),
            customer: CustomerService::new(gateway.clone(), users.clone()),
            portal: PortalService::new(gateway.clone(), users.clone(), config.clone()),
            reconciler: Arc::new(BillingReconciler::new(
                gateway.clone(),
                users.clone(),
                MeteringEngine::default(),
            )),
            webhooks: WebhookHandler::new(
                SubscriptionSync::new(gateway, users, config.clone()),
                config,
            ),
        }
    }
}
