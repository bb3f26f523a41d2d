//! API error responses
//!
//! One wrapper over the domain error taxonomies, mapped onto HTTP
//! status codes at the edge.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use suds_billing::BillingError;
use suds_orders::OrderError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Order(e) => match e {
                OrderError::Validation(_) => StatusCode::BAD_REQUEST,
                OrderError::Unauthorized { .. } => StatusCode::FORBIDDEN,
                OrderError::NotFound | OrderError::CustomerNotFound(_) => StatusCode::NOT_FOUND,
                // A lost write race reads the same as a mutated order:
                // the client refetches and retries
                OrderError::InvalidTransition { .. } | OrderError::StaleOrder => {
                    StatusCode::CONFLICT
                }
                OrderError::PaymentDeclined { .. } => StatusCode::PAYMENT_REQUIRED,
                OrderError::Provider(_) => StatusCode::BAD_GATEWAY,
                OrderError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Billing(e) => match e {
                BillingError::PaymentDeclined { .. } | BillingError::MissingPaymentMethod => {
                    StatusCode::PAYMENT_REQUIRED
                }
                BillingError::NotFound(_) => StatusCode::NOT_FOUND,
                BillingError::WebhookSignatureInvalid
                | BillingError::MalformedEvent(_)
                | BillingError::UnknownPlan(_) => StatusCode::BAD_REQUEST,
                BillingError::Provider(_) => StatusCode::BAD_GATEWAY,
                BillingError::Config(_) | BillingError::Store(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
