//! Application state

use std::sync::Arc;

use suds_billing::{BillingService, StripeConfig};
use suds_orders::{OrderIntake, OrderQueryService, OrderStateMachine};
use suds_shared::MemoryStore;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<OrderIntake>,
    pub state_machine: Arc<OrderStateMachine>,
    pub queries: Arc<OrderQueryService>,
    pub billing: Arc<BillingService>,
}

impl AppState {
    pub fn new(store: Arc<MemoryStore>, stripe_config: StripeConfig) -> Self {
        let billing = Arc::new(BillingService::new(stripe_config, store.clone()));
        Self::with_billing(store, billing)
    }

    /// Wire the order services around an existing billing service
    /// (tests inject a mock gateway this way).
    pub fn with_billing(store: Arc<MemoryStore>, billing: Arc<BillingService>) -> Self {
        Self {
            intake: Arc::new(OrderIntake::new(store.clone())),
            state_machine: Arc::new(OrderStateMachine::new(
                store.clone(),
                billing.reconciler.clone(),
            )),
            queries: Arc::new(OrderQueryService::new(store)),
            billing,
        }
    }
}
