//! Shared domain types and database plumbing used by every ScalaZap crate.

pub mod db;
pub mod money;
pub mod types;

pub use db::{create_pool, run_migrations};
pub use money::parse_brl_cents;
pub use types::{
    normalize_email, AccountStatus, CartStatus, PaymentMethod, PlanTier, PurchaseKind,
    SubscriptionStatus,
};
