//! Error types for identity provisioning.

use thiserror::Error;

/// Failures from the identity provider admin API.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider already holds an identity for this email. Callers treat
    /// this as a signal to look the identity up and reuse it.
    #[error("identity already exists")]
    AlreadyExists,
    #[error("identity provider error: {0}")]
    Upstream(String),
}

/// Failures from the tenant member directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Unique violation on (tenant_id, email).
    #[error("member already exists")]
    Duplicate,
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for DirectoryError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = e {
            if db.is_unique_violation() {
                return DirectoryError::Duplicate;
            }
        }
        DirectoryError::Database(e.to_string())
    }
}

pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// What the caller of the provisioning saga sees. Messages are written for
/// the dashboard operator, not for logs.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("'{0}' is already a member of this tenant")]
    DuplicateMember(String),
    #[error("authentication system unavailable: {0}")]
    IdentityProvider(String),
    #[error("could not confirm new login after creation; the identity id '{0}' is not valid")]
    MalformedIdentityId(String),
    #[error("could not save the new member: {0}")]
    Store(String),
}
