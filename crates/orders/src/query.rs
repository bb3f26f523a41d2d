//! Order query service
//!
//! Read-only filtering and pagination of the order collection for the
//! dashboards. Each dashboard names a status group; the actor's role
//! scopes which of those orders they may see.

use std::sync::Arc;

use serde::Serialize;

use suds_shared::store::OrderStore;
use suds_shared::{ActorContext, ActorRole, Order, OrderStatus, StatusGroup};

use crate::error::OrderResult;

const MAX_PAGE_SIZE: usize = 100;

/// Order plus the role-projected wire status (the washer-history
/// "completed" code).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub display_status: u8,
}

/// One page of matching orders plus the total matching count
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub orders: Vec<OrderView>,
    pub total_count: usize,
    pub page: usize,
    pub limit: usize,
}

/// Dashboard query service. No side effects.
pub struct OrderQueryService {
    store: Arc<dyn OrderStore>,
}

impl OrderQueryService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Fetch the orders visible to `actor` in `group`, newest first,
    /// with offset/limit pagination (`page` is zero-indexed).
    pub async fn fetch_orders(
        &self,
        actor: &ActorContext,
        group: StatusGroup,
        page: usize,
        limit: usize,
    ) -> OrderResult<OrderPage> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);

        let mut matching: Vec<Order> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|o| group.contains(o.status) && Self::visible_to(o, actor, group))
            .collect();

        matching.sort_by(|a, b| b.placed_at.cmp(&a.placed_at).then(a.id.cmp(&b.id)));

        let total_count = matching.len();
        let orders = matching
            .into_iter()
            .skip(page.saturating_mul(limit))
            .take(limit)
            .map(|order| OrderView {
                display_status: order.status.display_code(actor.role, group),
                order,
            })
            .collect();

        Ok(OrderPage {
            orders,
            total_count,
            page,
            limit,
        })
    }

    fn visible_to(order: &Order, actor: &ActorContext, group: StatusGroup) -> bool {
        match actor.role {
            ActorRole::Admin => true,
            ActorRole::Customer => order.customer_email == actor.email,
            ActorRole::Driver => match group {
                // Unclaimed work: fresh pickups and finished washes
                StatusGroup::DriverAvailable => match order.status {
                    OrderStatus::Placed => order.pickup.driver_email.is_none(),
                    OrderStatus::WashComplete => order.dropoff.driver_email.is_none(),
                    _ => false,
                },
                StatusGroup::DriverAccepted => match order.status {
                    OrderStatus::DriverAcceptedPickup | OrderStatus::WeightEntered => {
                        order.pickup.driver_email.as_deref() == Some(actor.email.as_str())
                    }
                    OrderStatus::DriverAcceptedDropoff => {
                        order.dropoff.driver_email.as_deref() == Some(actor.email.as_str())
                    }
                    _ => false,
                },
                _ => order.assigned_driver() == Some(actor.email.as_str()),
            },
            ActorRole::Washer => match group {
                // Loads stay visible to every washer until one claims
                // the wash by completing it
                StatusGroup::WasherActive => true,
                _ => order.washer_email.as_deref() == Some(actor.email.as_str()),
            },
        }
    }
}
