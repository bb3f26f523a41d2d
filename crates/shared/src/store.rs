//! Document store seam
//!
//! Persistence is an external collaborator: a generic document store
//! accessed by key. These traits are the whole contract the rest of
//! the workspace is allowed to assume. `MemoryStore` is the default
//! in-process backend and the test double.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Order, Subscription, User};
use crate::status::OrderStatus;

/// Backend failure (connectivity, serialization, ...)
#[derive(Debug, Clone, thiserror::Error)]
#[error("store error: {0}")]
pub struct StoreError(pub String);

pub type StoreResult<T> = Result<T, StoreError>;

/// Order documents, keyed by order id
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>>;

    async fn insert(&self, order: Order) -> StoreResult<()>;

    /// Full scan; filtering/pagination happens in the query service.
    async fn list(&self) -> StoreResult<Vec<Order>>;

    /// Compare-and-set write: replaces the document only if its stored
    /// status still equals `expected`. Returns false on mismatch (the
    /// order was mutated concurrently) without touching the document.
    async fn update_if_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        updated: Order,
    ) -> StoreResult<bool>;
}

/// User documents, keyed by email, with a secondary lookup by the
/// payment provider's customer id (webhook sync path)
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn get_by_customer_id(&self, customer_id: &str) -> StoreResult<Option<User>>;

    async fn upsert(&self, user: User) -> StoreResult<()>;

    /// Wholesale-replace the subscription for the user matching the
    /// provider customer id. Returns false if no such user exists.
    async fn set_subscription_by_customer_id(
        &self,
        customer_id: &str,
        subscription: Subscription,
    ) -> StoreResult<bool>;

    /// Replace the subscription snapshot for a user by email.
    /// Returns false if the user does not exist.
    async fn set_subscription(&self, email: &str, subscription: Subscription) -> StoreResult<bool>;

    /// Install a new on-file payment method, returning the previous
    /// one (the caller is responsible for detaching it provider-side).
    async fn set_payment_method(
        &self,
        email: &str,
        payment_method_id: String,
    ) -> StoreResult<Option<String>>;
}

/// In-memory keyed document store
#[derive(Default)]
pub struct MemoryStore {
    orders: RwLock<HashMap<Uuid, Order>>,
    users: RwLock<HashMap<String, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn insert(&self, order: Order) -> StoreResult<()> {
        self.orders.write().await.insert(order.id, order);
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<Order>> {
        Ok(self.orders.read().await.values().cloned().collect())
    }

    async fn update_if_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        updated: Order,
    ) -> StoreResult<bool> {
        // Write lock held across compare + replace: two racing
        // transitions cannot both observe the expected status.
        let mut orders = self.orders.write().await;
        match orders.get(&id) {
            Some(current) if current.status == expected => {
                orders.insert(id, updated);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Ok(false),
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn get_by_customer_id(&self, customer_id: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.customer_id == customer_id)
            .cloned())
    }

    async fn upsert(&self, user: User) -> StoreResult<()> {
        self.users.write().await.insert(user.email.clone(), user);
        Ok(())
    }

    async fn set_subscription_by_customer_id(
        &self,
        customer_id: &str,
        subscription: Subscription,
    ) -> StoreResult<bool> {
        let mut users = self.users.write().await;
        match users.values_mut().find(|u| u.customer_id == customer_id) {
            Some(user) => {
                user.subscription = Some(subscription);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_subscription(&self, email: &str, subscription: Subscription) -> StoreResult<bool> {
        let mut users = self.users.write().await;
        match users.get_mut(email) {
            Some(user) => {
                user.subscription = Some(subscription);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_payment_method(
        &self,
        email: &str,
        payment_method_id: String,
    ) -> StoreResult<Option<String>> {
        let mut users = self.users.write().await;
        match users.get_mut(email) {
            Some(user) => Ok(user.payment_method_id.replace(payment_method_id)),
            None => Err(StoreError(format!("user not found: {email}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LegInfo, Preferences};
    use time::OffsetDateTime;

    fn sample_order(status: OrderStatus) -> Order {
        Order {
            id: Uuid::new_v4(),
            customer_email: "user@example.com".to_string(),
            status,
            weight_lbs: None,
            cost_cents: None,
            pickup: LegInfo {
                address: "100 Main St".to_string(),
                date: "01/15/2026".to_string(),
                time: "12:00".to_string(),
                driver_email: None,
            },
            dropoff: LegInfo::default(),
            washer_email: None,
            preferences: Preferences::default(),
            washer_instructions: String::new(),
            address_instructions: String::new(),
            placed_at: OffsetDateTime::now_utc(),
            transitions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn cas_rejects_stale_status() {
        let store = MemoryStore::new();
        let order = sample_order(OrderStatus::Placed);
        let id = order.id;
        store.insert(order.clone()).await.unwrap();

        let mut accepted = order.clone();
        accepted.status = OrderStatus::DriverAcceptedPickup;
        assert!(store
            .update_if_status(id, OrderStatus::Placed, accepted)
            .await
            .unwrap());

        // Second writer still thinks the order is Placed
        let mut cancelled = order;
        cancelled.status = OrderStatus::Cancelled;
        assert!(!store
            .update_if_status(id, OrderStatus::Placed, cancelled)
            .await
            .unwrap());

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::DriverAcceptedPickup);
    }

    #[tokio::test]
    async fn cas_on_missing_order_is_false() {
        let store = MemoryStore::new();
        let order = sample_order(OrderStatus::Placed);
        assert!(!store
            .update_if_status(order.id, OrderStatus::Placed, order.clone())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn customer_id_lookup_finds_user() {
        let store = MemoryStore::new();
        store
            .upsert(User::new("a@example.com", "cus_123"))
            .await
            .unwrap();

        let found = store.get_by_customer_id("cus_123").await.unwrap();
        assert_eq!(found.map(|u| u.email), Some("a@example.com".to_string()));
        assert!(store.get_by_customer_id("cus_999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn payment_method_replacement_returns_previous() {
        let store = MemoryStore::new();
        store
            .upsert(User::new("a@example.com", "cus_123"))
            .await
            .unwrap();

        let old = store
            .set_payment_method("a@example.com", "pm_new".to_string())
            .await
            .unwrap();
        assert_eq!(old, None);

        let old = store
            .set_payment_method("a@example.com", "pm_newer".to_string())
            .await
            .unwrap();
        assert_eq!(old, Some("pm_new".to_string()));
    }
}
