// Test code patterns:
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! ScalaZap API Library
//!
//! This crate contains the HTTP server components for ScalaZap: the payment
//! webhook ingress, the admin surface for members and reconciliation ops,
//! and the wiring between them.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
