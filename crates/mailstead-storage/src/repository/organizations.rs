//! Organization repository

use crate::db::DatabasePool;
use crate::models::{CreateOrganization, Organization};
use async_trait::async_trait;
use mailstead_common::types::OrganizationId;
use mailstead_common::{Error, Result};
use uuid::Uuid;

/// Organization repository trait
#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    async fn create(&self, input: CreateOrganization) -> Result<Organization>;
    async fn get(&self, id: OrganizationId) -> Result<Option<Organization>>;

    /// Count active mailboxes across all of the organization's domains.
    /// Used by the mailbox provisioner to re-validate the cap at
    /// creation time.
    async fn count_active_mailboxes(&self, id: OrganizationId) -> Result<i64>;
}

/// Database organization repository
pub struct DbOrganizationRepository {
    pool: DatabasePool,
}

impl DbOrganizationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrganizationRepository for DbOrganizationRepository {
    async fn create(&self, input: CreateOrganization) -> Result<Organization> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now();

        sqlx::query(
            r#"
            INSERT INTO organizations (id, name, max_mailboxes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.max_mailboxes)
        .bind(now)
        .bind(now)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        self.get(id)
            .await?
            .ok_or_else(|| Error::Internal("Failed to create organization".to_string()))
    }

    async fn get(&self, id: OrganizationId) -> Result<Option<Organization>> {
        sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn count_active_mailboxes(&self, id: OrganizationId) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM email_accounts a
            JOIN domains d ON d.id = a.domain_id
            WHERE d.organization_id = $1 AND a.active = true
            "#,
        )
        .bind(id)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(count.0)
    }
}
