//! Weigh-in billing reconciliation
//!
//! Runs the charge-then-deduct cycle for a measured load. The charge
//! is the commit point: once it succeeds the weigh-in succeeds, and a
//! failed allowance deduction afterwards is logged as a shortfall
//! rather than unwinding the charge.

use std::sync::Arc;

use async_trait::async_trait;

use suds_orders::{WeighInError, WeighInProcessor, WeighInReceipt};
use suds_shared::store::UserStore;
use suds_shared::User;

use crate::error::{BillingError, BillingResult};
use crate::gateway::PaymentGateway;
use crate::metering::{ChargeInstruction, MeteringEngine};

/// Billing reconciler for the weigh-in edge
pub struct BillingReconciler {
    gateway: Arc<dyn PaymentGateway>,
    users: Arc<dyn UserStore>,
    metering: MeteringEngine,
}

impl BillingReconciler {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        users: Arc<dyn UserStore>,
        metering: MeteringEngine,
    ) -> Self {
        Self {
            gateway,
            users,
            metering,
        }
    }

    /// Meter the load, charge any overage, then deduct the consumed
    /// allowance. Returns the charged amount in cents.
    pub async fn charge_and_deduct(
        &self,
        customer_email: &str,
        weight_lbs: f64,
    ) -> BillingResult<i64> {
        let user = self
            .users
            .get_by_email(customer_email)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("customer: {customer_email}")))?;

        let instruction = self.metering.compute_charge(weight_lbs, user.subscription.as_ref());

        if instruction.amount_due_cents > 0 {
            let payment_method = user
                .payment_method_id
                .as_deref()
                .ok_or(BillingError::MissingPaymentMethod)?;
            let intent_id = self
                .gateway
                .charge(&user.customer_id, payment_method, instruction.amount_due_cents)
                .await?;
            tracing::info!(
                customer = %customer_email,
                payment_intent = %intent_id,
                amount_cents = instruction.amount_due_cents,
                billable_lbs = instruction.billable_lbs,
                "Overage charged"
            );
        }

        self.deduct_allowance(&user, &instruction).await;

        Ok(instruction.amount_due_cents)
    }

    /// Best-effort allowance deduction, floored at zero. The charge
    /// already settled, so a store failure here is a reconciliation
    /// shortfall to fix by hand, not a weigh-in failure.
    async fn deduct_allowance(&self, user: &User, instruction: &ChargeInstruction) {
        if instruction.allowance_consumed <= 0.0 {
            return;
        }
        let Some(subscription) = user.subscription.as_ref() else {
            return;
        };

        let mut updated = subscription.clone();
        updated.lbs_left = (updated.lbs_left - instruction.allowance_consumed).max(0.0);

        match self.users.set_subscription(&user.email, updated).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!(
                    customer = %user.email,
                    consumed_lbs = instruction.allowance_consumed,
                    "Reconciliation shortfall: user vanished before allowance deduction"
                );
            }
            Err(e) => {
                tracing::error!(
                    customer = %user.email,
                    consumed_lbs = instruction.allowance_consumed,
                    error = %e,
                    "Reconciliation shortfall: allowance deduction failed after charge"
                );
            }
        }
    }
}

#[async_trait]
impl WeighInProcessor for BillingReconciler {
    async fn process(
        &self,
        customer_email: &str,
        weight_lbs: f64,
    ) -> Result<WeighInReceipt, WeighInError> {
        let cost_cents = self
            .charge_and_deduct(customer_email, weight_lbs)
            .await
            .map_err(|e| match e {
                BillingError::PaymentDeclined { reason } => WeighInError::PaymentDeclined { reason },
                BillingError::MissingPaymentMethod => WeighInError::PaymentDeclined {
                    reason: "no payment method on file".to_string(),
                },
                BillingError::NotFound(_) => {
                    WeighInError::CustomerNotFound(customer_email.to_string())
                }
                other => WeighInError::Provider(other.to_string()),
            })?;

        Ok(WeighInReceipt { cost_cents })
    }
}
