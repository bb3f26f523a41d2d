//! Actor extraction
//!
//! Upstream auth terminates before this service and forwards the
//! verified identity in headers: `x-actor-email` and `x-actor-role`.
//! Both are required on every authenticated route.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use suds_shared::{ActorContext, ActorRole};

use crate::error::ApiError;

const EMAIL_HEADER: &str = "x-actor-email";
const ROLE_HEADER: &str = "x-actor-role";

/// Extracts the [`ActorContext`] from the identity headers
pub struct Actor(pub ActorContext);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| ApiError::BadRequest(format!("missing {name} header")))
        };

        let email = header(EMAIL_HEADER)?;
        let role: ActorRole = header(ROLE_HEADER)?
            .parse()
            .map_err(|e: String| ApiError::BadRequest(e))?;

        Ok(Actor(ActorContext::new(email, role)))
    }
}
