//! Member provisioning and listing (admin surface).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use scalazap_provisioning::{MemberRecord, ProvisionMemberRequest};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn default_role() -> String {
    "member".to_string()
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub name: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: String,
}

/// POST /admin/tenants/{tenant_id}/members
pub async fn add_member(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(body): Json<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let Some(saga) = state.provisioning.as_ref() else {
        return Err(ApiError::ServiceUnavailable(
            "member provisioning is not configured on this deployment".to_string(),
        ));
    };

    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("name must not be empty".to_string()));
    }
    if !body.email.contains('@') {
        return Err(ApiError::Validation(format!(
            "'{}' is not an email address",
            body.email.trim()
        )));
    }

    let provisioned = saga
        .provision(ProvisionMemberRequest {
            tenant_id,
            name: name.to_string(),
            email: body.email,
            role: body.role,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "member": provisioned.member,
            "identity_created": provisioned.identity_created,
        })),
    ))
}

/// GET /admin/tenants/{tenant_id}/members
pub async fn list_members(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> ApiResult<Json<Vec<MemberRecord>>> {
    let members = state
        .members
        .list_for_tenant(tenant_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(members))
}

/// POST /admin/members/{member_id}/deactivate
pub async fn deactivate_member(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let deactivated = state
        .members
        .deactivate(member_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    if !deactivated {
        return Err(ApiError::NotFound(format!("no member {member_id}")));
    }

    tracing::info!(member_id = %member_id, "Deactivated member");
    Ok(Json(json!({ "deactivated": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_defaults_to_member() {
        let body: AddMemberRequest =
            serde_json::from_str(r#"{"name": "Ana", "email": "ana@example.com"}"#).unwrap();
        assert_eq!(body.role, "member");

        let body: AddMemberRequest = serde_json::from_str(
            r#"{"name": "Ana", "email": "ana@example.com", "role": "admin"}"#,
        )
        .unwrap();
        assert_eq!(body.role, "admin");
    }
}
