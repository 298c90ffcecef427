//! Admin surface authentication.
//!
//! The admin routes are guarded by a single static bearer token compared in
//! constant time. No token configured means the surface stays closed.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

/// Extract a bearer token from the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Constant-time token comparison.
pub fn tokens_match(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Middleware guarding the admin routes.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.admin_api_token.as_deref() else {
        return ApiError::ServiceUnavailable(
            "admin API is not configured on this deployment".to_string(),
        )
        .into_response();
    };

    match bearer_token(request.headers()) {
        Some(provided) if tokens_match(provided, expected) => next.run(request).await,
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "Admin request with wrong token");
            ApiError::Unauthorized.into_response()
        }
        None => ApiError::Unauthorized.into_response(),
    }
}
