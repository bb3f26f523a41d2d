//! Route definitions

pub mod billing;
pub mod orders;
pub mod webhook;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Orders
        .route("/api/order/place", post(orders::place))
        .route("/api/order/fetchOrders", get(orders::fetch))
        .route("/api/order/{id}/acceptPickup", post(orders::accept_pickup))
        .route("/api/order/{id}/enterWeight", post(orders::enter_weight))
        .route("/api/order/{id}/dropAtWasher", post(orders::drop_at_washer))
        .route("/api/order/{id}/completeWash", post(orders::complete_wash))
        .route("/api/order/{id}/acceptDropoff", post(orders::accept_dropoff))
        .route("/api/order/{id}/deliver", post(orders::deliver))
        .route("/api/order/{id}/cancel", post(orders::cancel))
        // Billing
        .route("/api/stripe/setupIntent", post(billing::setup_intent))
        .route("/api/stripe/checkoutSession", post(billing::checkout))
        .route("/api/stripe/portalSession", post(billing::portal))
        .route(
            "/api/stripe/paymentMethod",
            post(billing::replace_payment_method),
        )
        .route("/api/stripe/cardDetails", post(billing::card_details))
        // Provider webhooks (no actor headers; signature-authenticated)
        .route("/api/webhook", post(webhook::stripe_webhook))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use suds_billing::{PriceIds, StripeConfig};
    use suds_shared::MemoryStore;
    use tower::ServiceExt;

    fn test_state() -> (Arc<MemoryStore>, AppState) {
        let store = MemoryStore::shared();
        // Gateway points nowhere; these tests never reach the provider
        let config = StripeConfig {
            secret_key: "sk_test_123".to_string(),
            webhook_secret: None,
            price_ids: PriceIds {
                student: "price_student".to_string(),
                standard: "price_standard".to_string(),
                plus: "price_plus".to_string(),
                family: "price_family".to_string(),
            },
            success_url: "http://localhost:3000/subscribe/success".to_string(),
            cancel_url: "http://localhost:3000/subscribe".to_string(),
            portal_return_url: "http://localhost:3000/account".to_string(),
            api_base: "http://127.0.0.1:9".to_string(),
        };
        let state = AppState::new(store.clone(), config);
        (store, state)
    }

    fn place_request(email: &str) -> Request<Body> {
        let body = json!({
            "address": "100 Main St",
            "pickupDate": "01/16/2100",
            "pickupTime": "12:00"
        });
        Request::builder()
            .method("POST")
            .uri("/api/order/place")
            .header("content-type", "application/json")
            .header("x-actor-email", email)
            .header("x-actor-role", "customer")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_responds() {
        let (_, state) = test_state();
        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_identity_headers_are_rejected() {
        let (_, state) = test_state();
        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/order/fetchOrders?filter=history")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_role_is_rejected() {
        let (_, state) = test_state();
        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/order/fetchOrders?filter=history")
                    .header("x-actor-email", "a@example.com")
                    .header("x-actor-role", "superuser")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn place_then_fetch_round_trip() {
        let (_, state) = test_state();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(place_request("cust@example.com"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let order = body_json(response).await;
        assert_eq!(order["status"], 0);
        assert_eq!(order["customerEmail"], "cust@example.com");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/order/fetchOrders?filter=userActive&page=0&limit=10")
                    .header("x-actor-email", "cust@example.com")
                    .header("x-actor-role", "customer")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_json(response).await;
        assert_eq!(page["totalCount"], 1);
        assert_eq!(page["orders"][0]["displayStatus"], 0);
    }

    #[tokio::test]
    async fn cancel_route_enforces_the_transition_table() {
        let (_, state) = test_state();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(place_request("cust@example.com"))
            .await
            .unwrap();
        let order = body_json(response).await;
        let id = order["id"].as_str().unwrap().to_string();

        // The owner can cancel a fresh order
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/order/{id}/cancel"))
                    .header("x-actor-email", "cust@example.com")
                    .header("x-actor-role", "customer")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cancelled = body_json(response).await;
        assert_eq!(cancelled["status"], 7);

        // A second cancel finds no legal edge from the terminal status
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/order/{id}/cancel"))
                    .header("x-actor-email", "cust@example.com")
                    .header("x-actor-role", "customer")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn other_customers_cannot_cancel_via_the_api() {
        let (_, state) = test_state();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(place_request("owner@example.com"))
            .await
            .unwrap();
        let order = body_json(response).await;
        let id = order["id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/order/{id}/cancel"))
                    .header("x-actor-email", "intruder@example.com")
                    .header("x-actor-role", "customer")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let (_, state) = test_state();
        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/order/{}/acceptPickup", uuid::Uuid::new_v4()))
                    .header("x-actor-email", "drv@example.com")
                    .header("x-actor-role", "driver")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unhandled_webhook_events_are_acknowledged() {
        let (_, state) = test_state();
        let payload = json!({ "type": "customer.created", "data": { "object": {} } });
        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["received"], true);
    }
}
