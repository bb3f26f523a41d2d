//! Order lifecycle routes
//!
//! Placement, the seven transition actions, and the dashboard fetch.
//! Every handler resolves the actor from the identity headers and
//! defers authorization to the domain services.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use suds_orders::{OrderPage, TransitionRequest};
use suds_shared::{NewOrder, Order, StatusGroup};

use crate::error::ApiError;
use crate::extract::Actor;
use crate::state::AppState;

pub async fn place(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(input): Json<NewOrder>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state.intake.place_order(input, &actor).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[derive(Debug, Deserialize)]
pub struct FetchParams {
    /// Status group name ("driverAvailable", "history", ...)
    filter: String,
    #[serde(default)]
    page: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    20
}

pub async fn fetch(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Query(params): Query<FetchParams>,
) -> Result<Json<OrderPage>, ApiError> {
    let group: StatusGroup = params
        .filter
        .parse()
        .map_err(|e: String| ApiError::BadRequest(e))?;
    let page = state
        .queries
        .fetch_orders(&actor, group, params.page, params.limit)
        .await?;
    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
pub struct EnterWeightBody {
    weight: f64,
}

pub async fn enter_weight(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(body): Json<EnterWeightBody>,
) -> Result<Json<Order>, ApiError> {
    transition(
        state,
        id,
        TransitionRequest::EnterWeight {
            weight_lbs: body.weight,
        },
        actor,
    )
    .await
}

macro_rules! transition_handler {
    ($name:ident, $request:expr) => {
        pub async fn $name(
            State(state): State<AppState>,
            Path(id): Path<Uuid>,
            Actor(actor): Actor,
        ) -> Result<Json<Order>, ApiError> {
            transition(state, id, $request, actor).await
        }
    };
}

transition_handler!(accept_pickup, TransitionRequest::AcceptPickup);
transition_handler!(drop_at_washer, TransitionRequest::DropAtWasher);
transition_handler!(complete_wash, TransitionRequest::CompleteWash);
transition_handler!(accept_dropoff, TransitionRequest::AcceptDropoff);
transition_handler!(deliver, TransitionRequest::Deliver);
transition_handler!(cancel, TransitionRequest::Cancel);

async fn transition(
    state: AppState,
    id: Uuid,
    request: TransitionRequest,
    actor: suds_shared::ActorContext,
) -> Result<Json<Order>, ApiError> {
    let order = state.state_machine.apply_transition(id, request, &actor).await?;
    Ok(Json(order))
}
