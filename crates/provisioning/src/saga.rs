//! Member provisioning saga.
//!
//! Provisioning spans two systems that cannot share a transaction: the
//! identity provider (login) and the member directory (our database). The
//! saga orders the steps so the cheap local check runs first, and undoes the
//! remote step when the local one fails afterwards.
//!
//! Compensation rule: only an identity created by this run is ever deleted.
//! A reused identity may belong to a member of another tenant and is never
//! touched, even when the run fails after finding it.

use std::sync::Arc;

use uuid::Uuid;

use scalazap_shared::normalize_email;

use crate::credentials::{generate_credential, CREDENTIAL_LENGTH};
use crate::error::{DirectoryError, IdentityError, ProvisionError, ProvisionResult};
use crate::identity::{IdentityProvider, NewIdentity};
use crate::members::{MemberDirectory, MemberRecord, NewMember};

/// Input for one provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisionMemberRequest {
    pub tenant_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// Result of a successful run. `identity_created` distinguishes a freshly
/// created login from a reused one; callers use it to decide whether a
/// welcome credential was issued.
#[derive(Debug)]
pub struct ProvisionedMember {
    pub member: MemberRecord,
    pub identity_created: bool,
}

/// Orchestrates identity creation and member insertion.
#[derive(Clone)]
pub struct ProvisioningSaga {
    identity: Arc<dyn IdentityProvider>,
    members: Arc<dyn MemberDirectory>,
}

impl ProvisioningSaga {
    pub fn new(identity: Arc<dyn IdentityProvider>, members: Arc<dyn MemberDirectory>) -> Self {
        Self { identity, members }
    }

    pub async fn provision(
        &self,
        request: ProvisionMemberRequest,
    ) -> ProvisionResult<ProvisionedMember> {
        let email = normalize_email(&request.email);

        // Local duplicate check first: no identity traffic for an email that
        // is already a member of this tenant.
        let exists = self
            .members
            .member_exists(request.tenant_id, &email)
            .await
            .map_err(store_error)?;
        if exists {
            return Err(ProvisionError::DuplicateMember(email));
        }

        let (identity_id, identity_created) =
            self.resolve_identity(&email, &request.name).await?;

        let parsed_identity_id = match Uuid::parse_str(&identity_id) {
            Ok(id) => id,
            Err(_) => {
                if identity_created {
                    self.compensate(&identity_id).await;
                }
                return Err(ProvisionError::MalformedIdentityId(identity_id));
            }
        };

        let inserted = self
            .members
            .insert(NewMember {
                tenant_id: request.tenant_id,
                name: request.name.clone(),
                email: email.clone(),
                role: request.role.clone(),
                identity_id: parsed_identity_id,
            })
            .await;

        let member = match inserted {
            Ok(member) => member,
            Err(e) => {
                if identity_created {
                    self.compensate(&identity_id).await;
                }
                return Err(match e {
                    DirectoryError::Duplicate => ProvisionError::DuplicateMember(email),
                    DirectoryError::Database(msg) => ProvisionError::Store(msg),
                });
            }
        };

        tracing::info!(
            tenant_id = %request.tenant_id,
            member_id = %member.id,
            email = %member.email,
            identity_created = identity_created,
            "Provisioned tenant member"
        );

        Ok(ProvisionedMember {
            member,
            identity_created,
        })
    }

    /// Find or create the login identity. Returns the provider's id for it
    /// and whether this run created it.
    async fn resolve_identity(
        &self,
        email: &str,
        name: &str,
    ) -> ProvisionResult<(String, bool)> {
        if let Some(existing) = self
            .identity
            .find_by_email(email)
            .await
            .map_err(upstream)?
        {
            tracing::info!(email = %email, identity_id = %existing.id, "Reusing existing identity");
            return Ok((existing.id, false));
        }

        let created = self
            .identity
            .create(NewIdentity {
                email: email.to_string(),
                password: generate_credential(CREDENTIAL_LENGTH),
                email_confirm: true,
                user_metadata: serde_json::json!({ "name": name }),
            })
            .await;

        match created {
            Ok(record) => Ok((record.id, true)),
            // Lost a creation race: someone registered the email between our
            // lookup and the create call. The winner's identity is reusable.
            Err(IdentityError::AlreadyExists) => {
                let found = self
                    .identity
                    .find_by_email(email)
                    .await
                    .map_err(upstream)?;
                match found {
                    Some(record) => {
                        tracing::info!(
                            email = %email,
                            identity_id = %record.id,
                            "Identity appeared concurrently; reusing it"
                        );
                        Ok((record.id, false))
                    }
                    None => Err(ProvisionError::IdentityProvider(
                        "identity reported as existing but could not be found".to_string(),
                    )),
                }
            }
            Err(e) => Err(upstream(e)),
        }
    }

    /// Best-effort rollback of an identity created by this run. The original
    /// failure is what the caller sees; a rollback failure is only logged.
    async fn compensate(&self, identity_id: &str) {
        match self.identity.delete(identity_id).await {
            Ok(()) => {
                tracing::warn!(identity_id = %identity_id, "Rolled back newly created identity");
            }
            Err(e) => {
                tracing::error!(
                    identity_id = %identity_id,
                    error = %e,
                    "Failed to roll back identity; it is now orphaned"
                );
            }
        }
    }
}

fn upstream(e: IdentityError) -> ProvisionError {
    ProvisionError::IdentityProvider(e.to_string())
}

fn store_error(e: DirectoryError) -> ProvisionError {
    match e {
        DirectoryError::Duplicate => ProvisionError::Store("unexpected duplicate".to_string()),
        DirectoryError::Database(msg) => ProvisionError::Store(msg),
    }
}
