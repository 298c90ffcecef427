//! Append-only store of every inbound webhook, written before any parsing
//! or reconciliation so the raw payload survives whatever happens next.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::BillingResult;

/// Origin label stamped on every stored event.
pub const WEBHOOK_ORIGIN: &str = "kirvano";

/// Event type recorded for bodies that never decoded into a payload.
pub const PARSE_ERROR_EVENT: &str = "PARSE_ERROR";

/// One stored webhook delivery.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoredWebhookEvent {
    pub id: Uuid,
    pub origin: String,
    pub event_type: String,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub payload: serde_json::Value,
    pub status: String,
    pub error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub received_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub processed_at: Option<OffsetDateTime>,
}

/// Persistence for inbound webhook deliveries.
#[derive(Clone)]
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a decoded delivery before it is dispatched. Returns the row id
    /// so later status updates can reference it.
    pub async fn record(
        &self,
        event_type: &str,
        customer_email: Option<&str>,
        customer_name: Option<&str>,
        payload: &serde_json::Value,
    ) -> BillingResult<Uuid> {
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO webhook_events (id, origin, event_type, customer_email, customer_name, payload, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'received')
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(WEBHOOK_ORIGIN)
        .bind(event_type)
        .bind(customer_email)
        .bind(customer_name)
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Record a body that did not decode as JSON at all. The raw text is
    /// kept wrapped in a JSON object so the row is still queryable.
    pub async fn record_parse_failure(&self, raw_body: &str, error: &str) -> BillingResult<Uuid> {
        let payload = serde_json::json!({ "raw": raw_body });
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO webhook_events
                (id, origin, event_type, payload, status, error, processed_at)
            VALUES ($1, $2, $3, $4, 'failed', $5, NOW())
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(WEBHOOK_ORIGIN)
        .bind(PARSE_ERROR_EVENT)
        .bind(&payload)
        .bind(error)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    pub async fn mark_processed(&self, id: Uuid) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = 'processed', error = NULL, processed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn mark_failed(&self, id: Uuid, error: &str) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = 'failed', error = $2, processed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn fetch(&self, id: Uuid) -> BillingResult<Option<StoredWebhookEvent>> {
        let event = sqlx::query_as::<_, StoredWebhookEvent>(
            r#"
            SELECT id, origin, event_type, customer_email, customer_name,
                   payload, status, error, received_at, processed_at
            FROM webhook_events
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    pub async fn list_recent(&self, limit: i64) -> BillingResult<Vec<StoredWebhookEvent>> {
        let events = sqlx::query_as::<_, StoredWebhookEvent>(
            r#"
            SELECT id, origin, event_type, customer_email, customer_name,
                   payload, status, error, received_at, processed_at
            FROM webhook_events
            ORDER BY received_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
