// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ScalaZap Billing Module
//!
//! Reconciles payment-processor webhooks into accounts, subscriptions and
//! the payment ledger.
//!
//! ## Features
//!
//! - **Event Store**: Append-only record of every inbound webhook, raw payload included
//! - **Typed Events**: One parse at the boundary into tagged payment events
//! - **Plan Classification**: Keyword and price-table mapping to plan tiers, total by construction
//! - **Reconciliation**: Email-keyed upserts for accounts, subscriptions and carts
//! - **Payment Ledger**: Append-only payment rows, duplicates preserved
//! - **Reconciliation Gaps**: Failed writes recorded as queryable, resolvable gap rows

pub mod classifier;
pub mod error;
pub mod event_store;
pub mod events;
pub mod gaps;
pub mod reconciler;


// Classifier
pub use classifier::classify;

// Error
pub use error::{BillingError, BillingResult};

// Event store
pub use event_store::{EventStore, StoredWebhookEvent, PARSE_ERROR_EVENT, WEBHOOK_ORIGIN};

// Events
pub use events::{
    CustomerInfo, IntentDetails, PaymentEvent, SaleDetails, SubscriptionDetails, WebhookPayload,
};

// Gaps
pub use gaps::{GapRecorder, NewGap, ReconciliationGap, WriteTarget};

// Reconciler
pub use reconciler::{target_account_status, ApplyOutcome, SubscriptionReconciler};

use sqlx::PgPool;

/// Everything the webhook ingress needs, wired from one pool.
#[derive(Clone)]
pub struct ReconciliationEngine {
    pub events: EventStore,
    pub reconciler: SubscriptionReconciler,
    pub gaps: GapRecorder,
}

impl ReconciliationEngine {
    pub fn new(pool: PgPool) -> Self {
        Self {
            events: EventStore::new(pool.clone()),
            reconciler: SubscriptionReconciler::new(pool.clone()),
            gaps: GapRecorder::new(pool),
        }
    }
}
