// Shared crate clippy configuration
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Suds Shared Module
//!
//! Domain types shared by every crate in the workspace:
//!
//! - **Models**: orders, users, subscriptions, plan tiers
//! - **Status Catalog**: the order status enum and its transition table
//! - **Stores**: keyed document-store traits plus the in-memory backend

pub mod models;
pub mod status;
pub mod store;

pub use models::{
    ActorContext, ActorRole, LegInfo, NewOrder, Order, PlanTier, Preferences, Subscription,
    TransitionRecord, User, INSTRUCTION_MAX_CHARS,
};
pub use status::{
    OrderStatus, StatusGroup, TransitionAction, TransitionEdge, CANCELLABLE, TRANSITIONS,
};
pub use store::{MemoryStore, OrderStore, StoreError, StoreResult, UserStore};
