//! Order error types

use suds_shared::store::StoreError;
use suds_shared::{ActorRole, OrderStatus, TransitionAction};

/// Errors surfaced by intake, transitions and queries.
///
/// Everything here is a structured result for the caller; nothing is
/// retried internally. `PaymentDeclined` is the one retryable case,
/// and the retry is the actor's (after fixing the payment method).
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("no {action} transition from status {from}")]
    InvalidTransition {
        from: OrderStatus,
        action: TransitionAction,
    },

    #[error("{role} is not authorized to {action} this order")]
    Unauthorized { role: ActorRole, action: String },

    /// The order changed between read and write; the actor should
    /// refresh and retry.
    #[error("order was modified concurrently")]
    StaleOrder,

    #[error("order not found")]
    NotFound,

    /// The order exists but its owner has no customer record
    #[error("no customer record for {0}")]
    CustomerNotFound(String),

    #[error("payment declined: {reason}")]
    PaymentDeclined { reason: String },

    /// Payment provider fault (outage, timeout). Not a decline: the
    /// card was never evaluated.
    #[error("payment provider error: {0}")]
    Provider(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type OrderResult<T> = Result<T, OrderError>;
