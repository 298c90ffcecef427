//! Identity provider admin client.
//!
//! Talks to the auth service's admin API (GoTrue-compatible) to look up,
//! create and delete login identities. The saga depends on the
//! [`IdentityProvider`] trait, not on this client, so tests can run against
//! in-memory fakes.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// An identity as returned by the provider. The id is kept as the raw
/// string; the saga validates it is a UUID before trusting it.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityRecord {
    pub id: String,
    pub email: Option<String>,
}

/// Request body for creating an identity.
#[derive(Debug, Serialize)]
pub struct NewIdentity {
    pub email: String,
    pub password: String,
    pub email_confirm: bool,
    pub user_metadata: serde_json::Value,
}

/// Admin operations against the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<IdentityRecord>, IdentityError>;

    /// Create an identity. Returns [`IdentityError::AlreadyExists`] when the
    /// provider reports the email is taken, so callers can re-query and
    /// reuse the winner of the race.
    async fn create(&self, identity: NewIdentity) -> Result<IdentityRecord, IdentityError>;

    /// Delete an identity. Deleting an id the provider no longer knows is
    /// not an error; compensation must be safe to retry.
    async fn delete(&self, id: &str) -> Result<(), IdentityError>;
}

#[derive(Debug, Deserialize)]
struct UserList {
    users: Vec<IdentityRecord>,
}

/// HTTP client for the provider's `/admin/users` surface.
#[derive(Clone)]
pub struct IdentityAdminClient {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl IdentityAdminClient {
    pub fn new(base_url: &str, service_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl IdentityProvider for IdentityAdminClient {
    async fn find_by_email(&self, email: &str) -> Result<Option<IdentityRecord>, IdentityError> {
        let response = self
            .http
            .get(self.url("/admin/users"))
            .query(&[("email", email)])
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::Upstream(format!(
                "identity lookup returned {}",
                response.status()
            )));
        }

        let list: UserList = response
            .json()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        // The endpoint filters loosely; pin the exact address.
        Ok(list
            .users
            .into_iter()
            .find(|u| u.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email))))
    }

    async fn create(&self, identity: NewIdentity) -> Result<IdentityRecord, IdentityError> {
        let response = self
            .http
            .post(self.url("/admin/users"))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&identity)
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 409 || status.as_u16() == 422 {
            return Err(IdentityError::AlreadyExists);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::Upstream(format!(
                "identity creation returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<(), IdentityError> {
        let response = self
            .http
            .delete(self.url(&format!("/admin/users/{id}")))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        let status = response.status();
        // Already gone counts as deleted; compensation retries land here.
        if status.is_success() || status.as_u16() == 404 {
            return Ok(());
        }

        Err(IdentityError::Upstream(format!(
            "identity deletion returned {status}"
        )))
    }
}
