//! API error type and HTTP mappings.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use scalazap_billing::BillingError;
use scalazap_provisioning::ProvisionError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details go to the log, not the client.
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal server error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "code": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<ProvisionError> for ApiError {
    fn from(e: ProvisionError) -> Self {
        match e {
            ProvisionError::DuplicateMember(_) => ApiError::Conflict(e.to_string()),
            ProvisionError::IdentityProvider(_) => ApiError::Upstream(e.to_string()),
            ProvisionError::MalformedIdentityId(_) | ProvisionError::Store(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(e: BillingError) -> Self {
        match e {
            BillingError::Parse(_) => ApiError::Validation(e.to_string()),
            BillingError::ClassificationGap(_) | BillingError::Database(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisioning_errors_map_to_their_statuses() {
        let conflict: ApiError =
            ProvisionError::DuplicateMember("ana@example.com".to_string()).into();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let upstream: ApiError = ProvisionError::IdentityProvider("timeout".to_string()).into();
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);

        let internal: ApiError = ProvisionError::Store("connection reset".to_string()).into();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn billing_parse_errors_are_bad_requests() {
        let validation: ApiError = BillingError::Parse("no email".to_string()).into();
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);

        let internal: ApiError = BillingError::Database("down".to_string()).into();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn not_found_and_unauthorized_statuses() {
        assert_eq!(
            ApiError::NotFound("no such gap".to_string()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::ServiceUnavailable("not configured".to_string()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
