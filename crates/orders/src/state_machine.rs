//! Order state machine
//!
//! Validates a requested transition against the shared catalog and the
//! requesting actor, then commits it with a compare-and-set write so a
//! concurrently-mutated order is rejected (`StaleOrder`), never merged.
//!
//! The weigh-in edge is the only one with a side effect: the billing
//! reconciler runs to completion *before* the order document is
//! touched, so a declined charge leaves status, weight and cost
//! exactly as they were.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use suds_shared::status::edge_for;
use suds_shared::store::OrderStore;
use suds_shared::{ActorContext, ActorRole, Order, TransitionAction, TransitionRecord};

use crate::error::{OrderError, OrderResult};

/// Result of a successful charge-and-weigh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeighInReceipt {
    /// Amount charged to the customer, in cents (0 for deduction-only)
    pub cost_cents: i64,
}

/// Failure of the charge-and-weigh cycle. The order is untouched in
/// every case.
#[derive(Debug, thiserror::Error)]
pub enum WeighInError {
    #[error("payment declined: {reason}")]
    PaymentDeclined { reason: String },

    #[error("customer not found: {0}")]
    CustomerNotFound(String),

    #[error("payment provider error: {0}")]
    Provider(String),
}

/// Billing seam for the weigh-in edge.
///
/// Implemented by the billing reconciler. The receipt is passed back
/// by value; no shared mutable context crosses this boundary.
#[async_trait]
pub trait WeighInProcessor: Send + Sync {
    async fn process(
        &self,
        customer_email: &str,
        weight_lbs: f64,
    ) -> Result<WeighInReceipt, WeighInError>;
}

/// A requested transition, named by the actor action that drives it
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionRequest {
    AcceptPickup,
    EnterWeight { weight_lbs: f64 },
    DropAtWasher,
    CompleteWash,
    AcceptDropoff,
    Deliver,
    Cancel,
}

impl TransitionRequest {
    pub fn action(&self) -> TransitionAction {
        match self {
            TransitionRequest::AcceptPickup => TransitionAction::AcceptPickup,
            TransitionRequest::EnterWeight { .. } => TransitionAction::EnterWeight,
            TransitionRequest::DropAtWasher => TransitionAction::DropAtWasher,
            TransitionRequest::CompleteWash => TransitionAction::CompleteWash,
            TransitionRequest::AcceptDropoff => TransitionAction::AcceptDropoff,
            TransitionRequest::Deliver => TransitionAction::Deliver,
            TransitionRequest::Cancel => TransitionAction::Cancel,
        }
    }
}

/// Order state machine service
pub struct OrderStateMachine {
    store: Arc<dyn OrderStore>,
    weigh_in: Arc<dyn WeighInProcessor>,
}

impl OrderStateMachine {
    pub fn new(store: Arc<dyn OrderStore>, weigh_in: Arc<dyn WeighInProcessor>) -> Self {
        Self { store, weigh_in }
    }

    /// Validate and apply a transition, returning the updated order.
    pub async fn apply_transition(
        &self,
        order_id: Uuid,
        request: TransitionRequest,
        actor: &ActorContext,
    ) -> OrderResult<Order> {
        let action = request.action();
        let order = self
            .store
            .get(order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        let edge = edge_for(action, order.status).ok_or(OrderError::InvalidTransition {
            from: order.status,
            action,
        })?;

        self.authorize(&order, action, edge.role, actor)?;

        let expected = order.status;
        let mut updated = order.clone();
        updated.status = edge.to;
        updated.transitions.push(TransitionRecord {
            status: edge.to,
            actor_email: actor.email.clone(),
            at: OffsetDateTime::now_utc(),
        });

        match request {
            TransitionRequest::AcceptPickup => {
                updated.pickup.driver_email = Some(actor.email.clone());
            }
            TransitionRequest::EnterWeight { weight_lbs } => {
                if !weight_lbs.is_finite() || weight_lbs <= 0.0 {
                    return Err(OrderError::Validation(
                        "weight must be a positive number of pounds".to_string(),
                    ));
                }
                // Charge cycle runs to definitive success or failure
                // before the document is written. No lock is held here.
                let receipt = self
                    .weigh_in
                    .process(&order.customer_email, weight_lbs)
                    .await
                    .map_err(|e| match e {
                        WeighInError::PaymentDeclined { reason } => {
                            OrderError::PaymentDeclined { reason }
                        }
                        WeighInError::CustomerNotFound(who) => OrderError::CustomerNotFound(who),
                        WeighInError::Provider(reason) => OrderError::Provider(reason),
                    })?;
                updated.weight_lbs = Some(weight_lbs);
                updated.cost_cents = Some(receipt.cost_cents);
            }
            TransitionRequest::AcceptDropoff => {
                updated.dropoff.driver_email = Some(actor.email.clone());
            }
            TransitionRequest::CompleteWash => {
                updated.washer_email = Some(actor.email.clone());
            }
            TransitionRequest::DropAtWasher
            | TransitionRequest::Deliver
            | TransitionRequest::Cancel => {}
        }

        let committed = self
            .store
            .update_if_status(order_id, expected, updated.clone())
            .await?;

        if !committed {
            tracing::warn!(
                order_id = %order_id,
                expected_status = %expected,
                action = %action,
                "Transition lost the write race; surfacing StaleOrder"
            );
            return Err(OrderError::StaleOrder);
        }

        tracing::info!(
            order_id = %order_id,
            from = %expected,
            to = %edge.to,
            action = %action,
            actor = %actor.email,
            role = %actor.role,
            "Order transition committed"
        );

        Ok(updated)
    }

    /// Role and assignment checks for an edge.
    ///
    /// The table authorizes one role per edge; admins are additionally
    /// allowed to cancel on the customer's behalf. Actions on a leg
    /// that already has an assignee must come from that assignee.
    fn authorize(
        &self,
        order: &Order,
        action: TransitionAction,
        edge_role: ActorRole,
        actor: &ActorContext,
    ) -> OrderResult<()> {
        let denied = || OrderError::Unauthorized {
            role: actor.role,
            action: action.to_string(),
        };

        let role_ok = actor.role == edge_role
            || (action == TransitionAction::Cancel && actor.role == ActorRole::Admin);
        if !role_ok {
            return Err(denied());
        }

        match action {
            TransitionAction::Cancel => {
                if actor.role == ActorRole::Customer && actor.email != order.customer_email {
                    return Err(denied());
                }
            }
            TransitionAction::EnterWeight | TransitionAction::DropAtWasher => {
                if let Some(assigned) = order.pickup.driver_email.as_deref() {
                    if assigned != actor.email {
                        return Err(denied());
                    }
                }
            }
            TransitionAction::Deliver => {
                if let Some(assigned) = order.dropoff.driver_email.as_deref() {
                    if assigned != actor.email {
                        return Err(denied());
                    }
                }
            }
            TransitionAction::AcceptPickup
            | TransitionAction::CompleteWash
            | TransitionAction::AcceptDropoff => {}
        }

        Ok(())
    }
}
