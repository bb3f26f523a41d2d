//! Customer payment method management
//!
//! Keeps exactly one payment method on file per customer. Installing a
//! new one detaches the old provider-side; a failed detach leaves a
//! dangling provider object but never blocks the swap.

use std::sync::Arc;

use serde::Serialize;

use suds_shared::store::UserStore;

use crate::error::{BillingError, BillingResult};
use crate::gateway::{CardDetails, PaymentGateway};

/// Result of a payment method swap
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodSwap {
    /// Payment method that was replaced, if any
    pub previous: Option<String>,
    /// Whether the previous method was detached provider-side
    pub old_detached: bool,
}

/// Customer service
pub struct CustomerService {
    gateway: Arc<dyn PaymentGateway>,
    users: Arc<dyn UserStore>,
}

impl CustomerService {
    pub fn new(gateway: Arc<dyn PaymentGateway>, users: Arc<dyn UserStore>) -> Self {
        Self { gateway, users }
    }

    /// Install `payment_method_id` as the customer's on-file method
    /// and detach the previous one.
    pub async fn replace_payment_method(
        &self,
        customer_email: &str,
        payment_method_id: String,
    ) -> BillingResult<PaymentMethodSwap> {
        let previous = self
            .users
            .set_payment_method(customer_email, payment_method_id.clone())
            .await?;

        let mut old_detached = false;
        if let Some(old) = previous.as_deref() {
            match self.gateway.detach_payment_method(old).await {
                Ok(()) => old_detached = true,
                Err(e) => {
                    // The new method is already installed; the stale
                    // provider object is cleanup, not a failure.
                    tracing::warn!(
                        customer = %customer_email,
                        old_payment_method = %old,
                        error = %e,
                        "Failed to detach replaced payment method"
                    );
                }
            }
        }

        tracing::info!(
            customer = %customer_email,
            payment_method = %payment_method_id,
            replaced = previous.is_some(),
            "Payment method installed"
        );

        Ok(PaymentMethodSwap {
            previous,
            old_detached,
        })
    }

    /// Card summary for the on-file payment method.
    pub async fn card_details(&self, customer_email: &str) -> BillingResult<CardDetails> {
        let user = self
            .users
            .get_by_email(customer_email)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("customer: {customer_email}")))?;
        let payment_method = user
            .payment_method_id
            .as_deref()
            .ok_or(BillingError::MissingPaymentMethod)?;
        self.gateway.retrieve_payment_method(payment_method).await
    }
}
