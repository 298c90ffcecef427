//! Operational endpoints: reconciliation gaps and stored webhook events.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use scalazap_billing::{PaymentEvent, ReconciliationGap, StoredWebhookEvent, WebhookPayload};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    fn effective(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 500)
    }
}

/// GET /admin/reconciliation/gaps
pub async fn list_gaps(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<ReconciliationGap>>> {
    let gaps = state.engine.gaps.list_unresolved(query.effective()).await?;
    Ok(Json(gaps))
}

/// POST /admin/reconciliation/gaps/{gap_id}/resolve
pub async fn resolve_gap(
    State(state): State<AppState>,
    Path(gap_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let resolved = state.engine.gaps.resolve(gap_id).await?;
    if !resolved {
        return Err(ApiError::NotFound(format!(
            "no unresolved gap {gap_id}"
        )));
    }

    tracing::info!(gap_id = %gap_id, "Resolved reconciliation gap");
    Ok(Json(json!({ "resolved": true })))
}

/// GET /admin/webhook-events
pub async fn list_webhook_events(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<StoredWebhookEvent>>> {
    let events = state.engine.events.list_recent(query.effective()).await?;
    Ok(Json(events))
}

/// POST /admin/webhook-events/{event_id}/replay
///
/// Re-applies a stored event through the same reconciler path as the live
/// ingress. Safe to repeat: every reconciliation write is an upsert, only
/// the payment ledger appends.
pub async fn replay_webhook_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let stored = state
        .engine
        .events
        .fetch(event_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no webhook event {event_id}")))?;

    let payload: WebhookPayload = serde_json::from_value(stored.payload.clone())
        .map_err(|_| {
            ApiError::Validation(format!(
                "stored payload of {event_id} is not replayable"
            ))
        })?;

    let event = PaymentEvent::from_payload(&payload)?;
    let outcome = state.engine.reconciler.apply(&event, Some(event_id)).await;

    if outcome.clean() {
        state.engine.events.mark_processed(event_id).await?;
    } else {
        let detail = format!("replay: {} write(s) failed", outcome.gaps);
        state.engine.events.mark_failed(event_id, &detail).await?;
    }

    tracing::info!(
        event_id = %event_id,
        event_type = %stored.event_type,
        gaps = outcome.gaps,
        "Replayed webhook event"
    );

    Ok(Json(json!({
        "replayed": true,
        "event": stored.event_type,
        "gaps": outcome.gaps,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(LimitQuery { limit: None }.effective(), 50);
        assert_eq!(LimitQuery { limit: Some(10) }.effective(), 10);
        assert_eq!(LimitQuery { limit: Some(0) }.effective(), 1);
        assert_eq!(LimitQuery { limit: Some(-5) }.effective(), 1);
        assert_eq!(LimitQuery { limit: Some(9000) }.effective(), 500);
    }
}
