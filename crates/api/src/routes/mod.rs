//! HTTP routes.

pub mod members;
pub mod ops;
pub mod webhooks;

use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::auth::require_admin;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let admin = Router::new()
        .route(
            "/tenants/{tenant_id}/members",
            post(members::add_member).get(members::list_members),
        )
        .route(
            "/members/{member_id}/deactivate",
            post(members::deactivate_member),
        )
        .route("/reconciliation/gaps", get(ops::list_gaps))
        .route(
            "/reconciliation/gaps/{gap_id}/resolve",
            post(ops::resolve_gap),
        )
        .route("/webhook-events", get(ops::list_webhook_events))
        .route(
            "/webhook-events/{event_id}/replay",
            post(ops::replay_webhook_event),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(health))
        .route(
            "/webhooks/payments",
            post(webhooks::receive_payment_webhook).get(webhooks::webhook_liveness),
        )
        .nest("/admin", admin)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
