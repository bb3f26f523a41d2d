//! Order intake
//!
//! Builds the status-0 order document from a customer request. The
//! scheduling window mirrors operations policy: pickups run 10:00 to
//! 19:00 and need at least an hour of lead time. All comparisons use
//! the service-area clock supplied by the caller.

use std::sync::Arc;

use time::macros::format_description;
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use suds_shared::store::OrderStore;
use suds_shared::{
    ActorContext, ActorRole, LegInfo, NewOrder, Order, OrderStatus, INSTRUCTION_MAX_CHARS,
};

use crate::error::{OrderError, OrderResult};

const OPEN: Time = time::macros::time!(10:00);
const CLOSE: Time = time::macros::time!(19:00);
const MIN_LEAD_MINUTES: i64 = 60;

/// Order intake service
pub struct OrderIntake {
    store: Arc<dyn OrderStore>,
}

impl OrderIntake {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Create a new order at status 0 for the requesting customer.
    pub async fn place_order(&self, input: NewOrder, actor: &ActorContext) -> OrderResult<Order> {
        self.place_order_at(input, actor, OffsetDateTime::now_utc())
            .await
    }

    /// Same as [`place_order`](Self::place_order) with an injected
    /// clock, for the scheduling-window checks.
    pub async fn place_order_at(
        &self,
        input: NewOrder,
        actor: &ActorContext,
        now: OffsetDateTime,
    ) -> OrderResult<Order> {
        if actor.role != ActorRole::Customer {
            return Err(OrderError::Unauthorized {
                role: actor.role,
                action: "place".to_string(),
            });
        }

        let address = input.address.trim();
        if address.is_empty() {
            return Err(OrderError::Validation("an address is required".to_string()));
        }
        if input.washer_instructions.chars().count() > INSTRUCTION_MAX_CHARS {
            return Err(OrderError::Validation(format!(
                "washer instructions are limited to {INSTRUCTION_MAX_CHARS} characters"
            )));
        }
        if input.address_instructions.chars().count() > INSTRUCTION_MAX_CHARS {
            return Err(OrderError::Validation(format!(
                "address instructions are limited to {INSTRUCTION_MAX_CHARS} characters"
            )));
        }

        validate_schedule(&input.pickup_date, &input.pickup_time, now)
            .map_err(OrderError::Validation)?;

        let order = Order {
            id: Uuid::new_v4(),
            customer_email: actor.email.clone(),
            status: OrderStatus::Placed,
            weight_lbs: None,
            cost_cents: None,
            pickup: LegInfo {
                address: address.to_string(),
                date: input.pickup_date.clone(),
                time: input.pickup_time.clone(),
                driver_email: None,
            },
            // Dropoff returns to the same address; scheduling happens
            // once the wash is complete.
            dropoff: LegInfo {
                address: address.to_string(),
                date: String::new(),
                time: String::new(),
                driver_email: None,
            },
            washer_email: None,
            preferences: input.preferences,
            washer_instructions: input.washer_instructions,
            address_instructions: input.address_instructions,
            placed_at: now,
            transitions: Vec::new(),
        };

        self.store.insert(order.clone()).await?;

        tracing::info!(
            order_id = %order.id,
            customer = %order.customer_email,
            pickup_date = %order.pickup.date,
            pickup_time = %order.pickup.time,
            "Order placed"
        );

        Ok(order)
    }
}

/// Validate "MM/DD/YYYY" + "HH:MM" against the operating window.
fn validate_schedule(date: &str, time_str: &str, now: OffsetDateTime) -> Result<(), String> {
    let date_format = format_description!("[month]/[day]/[year]");
    let time_format = format_description!("[hour]:[minute]");

    let pickup_date = Date::parse(date, &date_format)
        .map_err(|_| "please select a pickup date (MM/DD/YYYY)".to_string())?;
    let pickup_time = Time::parse(time_str, &time_format)
        .map_err(|_| "please select a pickup time (HH:MM)".to_string())?;

    if pickup_time < OPEN || pickup_time > CLOSE {
        return Err("the pickup time must be between 10 AM and 7 PM".to_string());
    }

    if pickup_date < now.date() {
        return Err("the pickup date has already passed".to_string());
    }

    if pickup_date == now.date() {
        let lead = (pickup_time - now.time()).whole_minutes();
        if lead < MIN_LEAD_MINUTES {
            return Err("the pickup time must be at least 1 hour from now".to_string());
        }
    }

    Ok(())
}
