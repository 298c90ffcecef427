// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ScalaZap Provisioning Module
//!
//! Creates dashboard operators: a login identity at the auth provider plus a
//! member row in the tenant directory, coordinated as a saga.
//!
//! ## Features
//!
//! - **Identity Admin Client**: Find, create and delete identities over the provider's admin API
//! - **Member Directory**: Tenant-scoped member rows keyed on (tenant, email)
//! - **Provisioning Saga**: Reuse-or-create identity, insert member, roll back on failure
//! - **Credentials**: Random temporary passwords for freshly created identities

pub mod credentials;
pub mod error;
pub mod identity;
pub mod members;
pub mod saga;

#[cfg(test)]
mod saga_tests;

// Credentials
pub use credentials::{generate_credential, CREDENTIAL_LENGTH};

// Error
pub use error::{DirectoryError, IdentityError, ProvisionError, ProvisionResult};

// Identity
pub use identity::{IdentityAdminClient, IdentityProvider, IdentityRecord, NewIdentity};

// Members
pub use members::{MemberDirectory, MemberRecord, NewMember, PgMemberDirectory};

// Saga
pub use saga::{ProvisionMemberRequest, ProvisionedMember, ProvisioningSaga};
