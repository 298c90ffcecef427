//! Reconciliation gaps: durable records of writes that failed while an
//! event was being applied. The webhook still returns 200; the gap row is
//! what ops queries to replay or repair the miss.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::BillingResult;

/// Which table the failed write was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    CustomerAccount,
    Subscription,
    AbandonedCart,
    Payment,
}

impl WriteTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteTarget::CustomerAccount => "customer_account",
            WriteTarget::Subscription => "subscription",
            WriteTarget::AbandonedCart => "abandoned_cart",
            WriteTarget::Payment => "payment",
        }
    }
}

/// A gap about to be recorded.
#[derive(Debug)]
pub struct NewGap<'a> {
    pub webhook_event_id: Option<Uuid>,
    pub event_type: &'a str,
    pub customer_email: Option<&'a str>,
    pub target: WriteTarget,
    pub detail: String,
}

/// A stored gap, as served to the ops surface.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReconciliationGap {
    pub id: Uuid,
    pub webhook_event_id: Option<Uuid>,
    pub event_type: String,
    pub customer_email: Option<String>,
    pub target: String,
    pub detail: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub resolved_at: Option<OffsetDateTime>,
}

/// Writes and queries reconciliation gaps.
#[derive(Clone)]
pub struct GapRecorder {
    pool: PgPool,
}

impl GapRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a gap. Never propagates its own failure: a gap write that
    /// fails is logged at error level and the caller carries on, since the
    /// original event row already holds the failed status.
    pub async fn record(&self, gap: NewGap<'_>) {
        let result = sqlx::query(
            r#"
            INSERT INTO reconciliation_gaps
                (id, webhook_event_id, event_type, customer_email, target, detail)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(gap.webhook_event_id)
        .bind(gap.event_type)
        .bind(gap.customer_email)
        .bind(gap.target.as_str())
        .bind(&gap.detail)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::warn!(
                    event_type = %gap.event_type,
                    target = %gap.target.as_str(),
                    detail = %gap.detail,
                    "Recorded reconciliation gap"
                );
            }
            Err(e) => {
                tracing::error!(
                    event_type = %gap.event_type,
                    target = %gap.target.as_str(),
                    detail = %gap.detail,
                    error = %e,
                    "Failed to record reconciliation gap"
                );
            }
        }
    }

    pub async fn list_unresolved(&self, limit: i64) -> BillingResult<Vec<ReconciliationGap>> {
        let gaps = sqlx::query_as::<_, ReconciliationGap>(
            r#"
            SELECT id, webhook_event_id, event_type, customer_email,
                   target, detail, created_at, resolved_at
            FROM reconciliation_gaps
            WHERE resolved_at IS NULL
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(gaps)
    }

    /// Mark a gap resolved. Returns false when the gap does not exist or was
    /// already resolved, so the caller can answer 404 rather than lie.
    pub async fn resolve(&self, id: Uuid) -> BillingResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE reconciliation_gaps
            SET resolved_at = NOW()
            WHERE id = $1 AND resolved_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
