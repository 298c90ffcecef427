// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Saga tests against in-memory fakes.
//!
//! The fakes record call counts and deletions so tests can assert not just
//! the outcome but the order guarantees: no identity traffic for local
//! duplicates, and compensation only for identities this run created.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{DirectoryError, IdentityError, ProvisionError};
use crate::identity::{IdentityProvider, IdentityRecord, NewIdentity};
use crate::members::{MemberDirectory, MemberRecord, NewMember};
use crate::saga::{ProvisionMemberRequest, ProvisioningSaga};

// ==== fakes ====

#[derive(Default)]
struct FakeIdentityProvider {
    identities: Mutex<HashMap<String, IdentityRecord>>,
    find_calls: AtomicUsize,
    create_calls: AtomicUsize,
    deleted: Mutex<Vec<String>>,
    reject_create_as_existing: AtomicBool,
    create_with_malformed_id: AtomicBool,
    // Simulates a lost creation race: the first lookup misses even when the
    // identity is seeded, later lookups see it.
    hide_first_find: AtomicBool,
}

impl FakeIdentityProvider {
    fn with_identity(email: &str, id: &str) -> Self {
        let provider = Self::default();
        provider.identities.lock().unwrap().insert(
            email.to_string(),
            IdentityRecord {
                id: id.to_string(),
                email: Some(email.to_string()),
            },
        );
        provider
    }

    fn deleted_ids(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn find_by_email(&self, email: &str) -> Result<Option<IdentityRecord>, IdentityError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if self.hide_first_find.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.identities.lock().unwrap().get(email).cloned())
    }

    async fn create(&self, identity: NewIdentity) -> Result<IdentityRecord, IdentityError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if self.reject_create_as_existing.load(Ordering::SeqCst) {
            return Err(IdentityError::AlreadyExists);
        }

        let id = if self.create_with_malformed_id.load(Ordering::SeqCst) {
            "not-a-uuid".to_string()
        } else {
            Uuid::new_v4().to_string()
        };

        let record = IdentityRecord {
            id,
            email: Some(identity.email.clone()),
        };
        self.identities
            .lock()
            .unwrap()
            .insert(identity.email, record.clone());
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<(), IdentityError> {
        self.deleted.lock().unwrap().push(id.to_string());
        self.identities
            .lock()
            .unwrap()
            .retain(|_, record| record.id != id);
        Ok(())
    }
}

#[derive(Default)]
struct FakeDirectory {
    members: Mutex<HashMap<(Uuid, String), MemberRecord>>,
    insert_calls: AtomicUsize,
    fail_insert_with_database_error: AtomicBool,
    // Simulates a concurrent insert slipping past the exists check: the
    // check reports absent while the unique key still holds the row.
    exists_reports_absent: AtomicBool,
}

impl FakeDirectory {
    fn with_member(tenant_id: Uuid, email: &str) -> Self {
        let directory = Self::default();
        directory.members.lock().unwrap().insert(
            (tenant_id, email.to_string()),
            MemberRecord {
                id: Uuid::new_v4(),
                tenant_id,
                name: "Existing".to_string(),
                email: email.to_string(),
                role: "member".to_string(),
                identity_id: Uuid::new_v4(),
                active: true,
                created_at: OffsetDateTime::now_utc(),
            },
        );
        directory
    }
}

#[async_trait]
impl MemberDirectory for FakeDirectory {
    async fn member_exists(&self, tenant_id: Uuid, email: &str) -> Result<bool, DirectoryError> {
        if self.exists_reports_absent.load(Ordering::SeqCst) {
            return Ok(false);
        }
        Ok(self
            .members
            .lock()
            .unwrap()
            .contains_key(&(tenant_id, email.to_string())))
    }

    async fn insert(&self, member: NewMember) -> Result<MemberRecord, DirectoryError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_insert_with_database_error.load(Ordering::SeqCst) {
            return Err(DirectoryError::Database("connection reset".to_string()));
        }

        let key = (member.tenant_id, member.email.clone());
        let mut members = self.members.lock().unwrap();
        if members.contains_key(&key) {
            return Err(DirectoryError::Duplicate);
        }

        let record = MemberRecord {
            id: Uuid::new_v4(),
            tenant_id: member.tenant_id,
            name: member.name,
            email: member.email,
            role: member.role,
            identity_id: member.identity_id,
            active: true,
            created_at: OffsetDateTime::now_utc(),
        };
        members.insert(key, record.clone());
        Ok(record)
    }

    async fn deactivate(&self, member_id: Uuid) -> Result<bool, DirectoryError> {
        let mut members = self.members.lock().unwrap();
        for record in members.values_mut() {
            if record.id == member_id {
                record.active = false;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<MemberRecord>, DirectoryError> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}

fn request(tenant_id: Uuid, email: &str) -> ProvisionMemberRequest {
    ProvisionMemberRequest {
        tenant_id,
        name: "Ana Souza".to_string(),
        email: email.to_string(),
        role: "member".to_string(),
    }
}

fn saga(
    identity: Arc<FakeIdentityProvider>,
    directory: Arc<FakeDirectory>,
) -> ProvisioningSaga {
    ProvisioningSaga::new(identity, directory)
}

// ==== tests ====

#[tokio::test]
async fn provisions_a_fresh_member_with_a_new_identity() {
    let identity = Arc::new(FakeIdentityProvider::default());
    let directory = Arc::new(FakeDirectory::default());
    let tenant_id = Uuid::new_v4();

    let provisioned = saga(identity.clone(), directory.clone())
        .provision(request(tenant_id, "ana@example.com"))
        .await
        .unwrap();

    assert!(provisioned.identity_created);
    assert_eq!(provisioned.member.email, "ana@example.com");
    assert_eq!(identity.create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(directory.insert_calls.load(Ordering::SeqCst), 1);
    assert!(identity.deleted_ids().is_empty());
}

#[tokio::test]
async fn reuses_an_existing_identity() {
    let existing_id = Uuid::new_v4().to_string();
    let identity = Arc::new(FakeIdentityProvider::with_identity(
        "ana@example.com",
        &existing_id,
    ));
    let directory = Arc::new(FakeDirectory::default());

    let provisioned = saga(identity.clone(), directory)
        .provision(request(Uuid::new_v4(), "ana@example.com"))
        .await
        .unwrap();

    assert!(!provisioned.identity_created);
    assert_eq!(provisioned.member.identity_id.to_string(), existing_id);
    assert_eq!(identity.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rejects_duplicates_before_any_identity_traffic() {
    let tenant_id = Uuid::new_v4();
    let identity = Arc::new(FakeIdentityProvider::default());
    let directory = Arc::new(FakeDirectory::with_member(tenant_id, "ana@example.com"));

    let err = saga(identity.clone(), directory)
        .provision(request(tenant_id, "ana@example.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::DuplicateMember(email) if email == "ana@example.com"));
    assert_eq!(identity.find_calls.load(Ordering::SeqCst), 0);
    assert_eq!(identity.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn deletes_the_new_identity_when_the_insert_fails() {
    let identity = Arc::new(FakeIdentityProvider::default());
    let directory = Arc::new(FakeDirectory::default());
    directory
        .fail_insert_with_database_error
        .store(true, Ordering::SeqCst);

    let err = saga(identity.clone(), directory)
        .provision(request(Uuid::new_v4(), "ana@example.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Store(_)));
    assert_eq!(identity.deleted_ids().len(), 1, "created identity rolled back");
    assert!(identity.identities.lock().unwrap().is_empty());
}

#[tokio::test]
async fn never_deletes_a_reused_identity() {
    let existing_id = Uuid::new_v4().to_string();
    let identity = Arc::new(FakeIdentityProvider::with_identity(
        "ana@example.com",
        &existing_id,
    ));
    let directory = Arc::new(FakeDirectory::default());
    directory
        .fail_insert_with_database_error
        .store(true, Ordering::SeqCst);

    let err = saga(identity.clone(), directory)
        .provision(request(Uuid::new_v4(), "ana@example.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Store(_)));
    assert!(identity.deleted_ids().is_empty(), "reused identity must survive");
}

#[tokio::test]
async fn lost_creation_race_requeries_and_reuses_the_winner() {
    let winner_id = Uuid::new_v4().to_string();
    let identity = Arc::new(FakeIdentityProvider::with_identity(
        "ana@example.com",
        &winner_id,
    ));
    // First lookup misses, create is rejected as existing, re-query hits.
    identity.hide_first_find.store(true, Ordering::SeqCst);
    identity.reject_create_as_existing.store(true, Ordering::SeqCst);
    let directory = Arc::new(FakeDirectory::default());

    let provisioned = saga(identity.clone(), directory)
        .provision(request(Uuid::new_v4(), "ana@example.com"))
        .await
        .unwrap();

    assert!(!provisioned.identity_created);
    assert_eq!(provisioned.member.identity_id.to_string(), winner_id);
    assert_eq!(identity.find_calls.load(Ordering::SeqCst), 2);
    assert_eq!(identity.create_calls.load(Ordering::SeqCst), 1);
    assert!(identity.deleted_ids().is_empty());
}

#[tokio::test]
async fn lost_race_with_a_vanished_winner_aborts() {
    let identity = Arc::new(FakeIdentityProvider::default());
    identity.reject_create_as_existing.store(true, Ordering::SeqCst);
    let directory = Arc::new(FakeDirectory::default());

    let err = saga(identity.clone(), directory.clone())
        .provision(request(Uuid::new_v4(), "ana@example.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::IdentityProvider(_)));
    assert_eq!(directory.insert_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_identity_id_is_compensated() {
    let identity = Arc::new(FakeIdentityProvider::default());
    identity.create_with_malformed_id.store(true, Ordering::SeqCst);
    let directory = Arc::new(FakeDirectory::default());

    let err = saga(identity.clone(), directory.clone())
        .provision(request(Uuid::new_v4(), "ana@example.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::MalformedIdentityId(id) if id == "not-a-uuid"));
    assert_eq!(identity.deleted_ids(), vec!["not-a-uuid".to_string()]);
    assert_eq!(directory.insert_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn insert_unique_violation_reads_as_duplicate_member() {
    let tenant_id = Uuid::new_v4();
    let identity = Arc::new(FakeIdentityProvider::default());
    let directory = Arc::new(FakeDirectory::with_member(tenant_id, "ana@example.com"));
    // A concurrent insert slipped past the exists check; the unique key is
    // the last line of defense and must still read as a duplicate.
    directory.exists_reports_absent.store(true, Ordering::SeqCst);

    let err = saga(identity.clone(), directory.clone())
        .provision(request(tenant_id, "ana@example.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::DuplicateMember(_)));
    assert_eq!(directory.insert_calls.load(Ordering::SeqCst), 1);
    // The identity was created fresh for this run, so it is rolled back.
    assert_eq!(identity.deleted_ids().len(), 1);
}

#[tokio::test]
async fn normalizes_the_email_before_everything_else() {
    let identity = Arc::new(FakeIdentityProvider::default());
    let directory = Arc::new(FakeDirectory::default());

    let provisioned = saga(identity.clone(), directory)
        .provision(request(Uuid::new_v4(), "  ANA@Example.COM "))
        .await
        .unwrap();

    assert_eq!(provisioned.member.email, "ana@example.com");
    assert!(identity
        .identities
        .lock()
        .unwrap()
        .contains_key("ana@example.com"));
}
