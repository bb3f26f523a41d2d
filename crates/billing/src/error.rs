//! Billing error types

use suds_shared::store::StoreError;
use thiserror::Error;

/// Errors from billing operations
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("payment provider error: {0}")]
    Provider(String),

    #[error("payment declined: {reason}")]
    PaymentDeclined { reason: String },

    #[error("no payment method on file")]
    MissingPaymentMethod,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unrecognized plan price: {0}")]
    UnknownPlan(String),

    #[error("webhook signature verification failed")]
    WebhookSignatureInvalid,

    #[error("malformed webhook event: {0}")]
    MalformedEvent(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type BillingResult<T> = Result<T, BillingError>;
