//! Billing portal
//!
//! Hands the customer off to the provider-hosted portal for invoice
//! history and subscription self-service.

use std::sync::Arc;

use serde::Serialize;

use suds_shared::store::UserStore;

use crate::config::StripeConfig;
use crate::error::{BillingError, BillingResult};
use crate::gateway::PaymentGateway;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalResponse {
    pub url: String,
}

/// Billing portal service
pub struct PortalService {
    gateway: Arc<dyn PaymentGateway>,
    users: Arc<dyn UserStore>,
    config: StripeConfig,
}

impl PortalService {
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

    pub async fn create_session(&self, customer_email: &str) -> BillingResult<PortalResponse> {
        let user = self
            .users
            .get_by_email(customer_email)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("customer: {customer_email}")))?;

        let session = self
            .gateway
            .create_portal_session(&user.customer_id, &self.config.portal_return_url)
            .await?;

        Ok(PortalResponse { url: session.url })
    }
}
