//! Payment webhook ingress.
//!
//! The processor retries on non-2xx and eventually gives up. Contract: only
//! an unparseable payload earns a 400. A recognized event is stored first
//! and answered 200 even when some of its writes fail; those failures land
//! in `reconciliation_gaps`, not in the response code.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use scalazap_billing::{PaymentEvent, WebhookPayload};
use scalazap_shared::normalize_email;

use crate::auth::{bearer_token, tokens_match};
use crate::config::Config;
use crate::state::AppState;

/// POST /webhooks/payments
pub async fn receive_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    verify_webhook_token(&state.config, &headers);

    let raw: serde_json::Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => {
            let detail = format!("body is not valid JSON: {e}");
            record_parse_failure(&state, &body, &detail).await;
            return bad_request(detail);
        }
    };

    let payload: WebhookPayload = match serde_json::from_value(raw.clone()) {
        Ok(payload) => payload,
        Err(e) => {
            let detail = format!("body is not a webhook payload: {e}");
            record_parse_failure(&state, &body, &detail).await;
            return bad_request(detail);
        }
    };

    // Store before parsing any further; the raw payload must survive even
    // if everything after this point fails.
    let (customer_email, customer_name) = customer_fields(&payload);
    let event_id: Option<Uuid> = match state
        .engine
        .events
        .record(
            &payload.event,
            customer_email.as_deref(),
            customer_name.as_deref(),
            &raw,
        )
        .await
    {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::error!(event_type = %payload.event, error = %e, "Could not store webhook event");
            None
        }
    };

    let event = match PaymentEvent::from_payload(&payload) {
        Ok(event) => event,
        Err(e) => {
            let detail = e.to_string();
            if let Some(id) = event_id {
                mark_failed(&state, id, &detail).await;
            }
            return bad_request(detail);
        }
    };

    let outcome = state.engine.reconciler.apply(&event, event_id).await;

    if let Some(id) = event_id {
        if outcome.clean() {
            if let Err(e) = state.engine.events.mark_processed(id).await {
                tracing::error!(event_id = %id, error = %e, "Could not mark webhook event processed");
            }
        } else {
            let detail = format!(
                "{} write(s) failed; see reconciliation_gaps",
                outcome.gaps
            );
            mark_failed(&state, id, &detail).await;
        }
    }

    (
        StatusCode::OK,
        Json(json!({ "success": true, "event": payload.event })),
    )
        .into_response()
}

/// GET /webhooks/payments
///
/// Liveness for the processor's endpoint check: reports which optional
/// pieces are configured, never touches the database.
pub async fn webhook_liveness(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "ok": true,
        "webhook_token_configured": state.config.webhook_token.is_some(),
        "identity_provider_configured": state.config.identity_provider_configured(),
    }))
}

/// Token verification is advisory: a mismatch is logged for ops to chase
/// but the event is still processed.
fn verify_webhook_token(config: &Config, headers: &HeaderMap) {
    let Some(expected) = config.webhook_token.as_deref() else {
        return;
    };

    let provided = headers
        .get("x-webhook-token")
        .and_then(|h| h.to_str().ok())
        .or_else(|| bearer_token(headers));

    match provided {
        Some(token) if tokens_match(token, expected) => {}
        Some(_) => {
            tracing::warn!("Webhook token mismatch; processing the event anyway");
        }
        None => {
            tracing::warn!("Webhook arrived without a token; processing the event anyway");
        }
    }
}

fn customer_fields(payload: &WebhookPayload) -> (Option<String>, Option<String>) {
    let Some(customer) = &payload.customer else {
        return (None, None);
    };
    let email = customer
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty());
    let name = customer
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    (email, name)
}

async fn record_parse_failure(state: &AppState, body: &str, detail: &str) {
    tracing::warn!(detail = %detail, "Rejecting unparseable webhook body");
    if let Err(e) = state.engine.events.record_parse_failure(body, detail).await {
        tracing::error!(error = %e, "Could not store parse failure");
    }
}

async fn mark_failed(state: &AppState, id: Uuid, detail: &str) {
    if let Err(e) = state.engine.events.mark_failed(id, detail).await {
        tracing::error!(event_id = %id, error = %e, "Could not mark webhook event failed");
    }
}

fn bad_request(detail: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": detail }))).into_response()
}
