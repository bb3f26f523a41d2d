// Orders crate clippy configuration
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Suds Orders Module
//!
//! The order lifecycle: intake, the transition state machine, and the
//! dashboard query service. Billing participates through the
//! [`WeighInProcessor`] seam only; this crate never talks to the
//! payment provider itself.

pub mod error;
pub mod intake;
pub mod query;
pub mod state_machine;


pub use error::{OrderError, OrderResult};
pub use intake::OrderIntake;
pub use query::{OrderPage, OrderQueryService, OrderView};
pub use state_machine::{
    OrderStateMachine, TransitionRequest, WeighInError, WeighInProcessor, WeighInReceipt,
};
