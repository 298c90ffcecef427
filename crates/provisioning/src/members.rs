//! Tenant member directory.
//!
//! Members are dashboard operators inside a tenant, each linked to exactly
//! one login identity at the provider. The unique key is (tenant_id, email);
//! the database enforces it and [`DirectoryError::Duplicate`] surfaces it.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::DirectoryError;

/// A stored member row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MemberRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub identity_id: Uuid,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A member about to be inserted.
#[derive(Debug, Clone)]
pub struct NewMember {
    pub tenant_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub identity_id: Uuid,
}

/// Storage operations the provisioning saga needs.
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn member_exists(&self, tenant_id: Uuid, email: &str) -> Result<bool, DirectoryError>;

    /// Insert a member. A (tenant_id, email) collision surfaces as
    /// [`DirectoryError::Duplicate`].
    async fn insert(&self, member: NewMember) -> Result<MemberRecord, DirectoryError>;

    /// Deactivate a member. Returns false when no such member exists;
    /// deactivating an already-inactive member returns true.
    async fn deactivate(&self, member_id: Uuid) -> Result<bool, DirectoryError>;

    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<MemberRecord>, DirectoryError>;
}

/// Postgres-backed directory.
#[derive(Clone)]
pub struct PgMemberDirectory {
    pool: PgPool,
}

impl PgMemberDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberDirectory for PgMemberDirectory {
    async fn member_exists(&self, tenant_id: Uuid, email: &str) -> Result<bool, DirectoryError> {
        let row: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM tenant_members
                WHERE tenant_id = $1 AND email = $2
            )
            "#,
        )
        .bind(tenant_id)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn insert(&self, member: NewMember) -> Result<MemberRecord, DirectoryError> {
        let record = sqlx::query_as::<_, MemberRecord>(
            r#"
            INSERT INTO tenant_members (id, tenant_id, name, email, role, identity_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, tenant_id, name, email, role, identity_id, active, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(member.tenant_id)
        .bind(&member.name)
        .bind(&member.email)
        .bind(&member.role)
        .bind(member.identity_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn deactivate(&self, member_id: Uuid) -> Result<bool, DirectoryError> {
        let result = sqlx::query(
            r#"
            UPDATE tenant_members
            SET active = FALSE
            WHERE id = $1
            "#,
        )
        .bind(member_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<MemberRecord>, DirectoryError> {
        let members = sqlx::query_as::<_, MemberRecord>(
            r#"
            SELECT id, tenant_id, name, email, role, identity_id, active, created_at
            FROM tenant_members
            WHERE tenant_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }
}
