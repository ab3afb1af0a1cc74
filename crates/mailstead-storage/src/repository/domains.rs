//! Domain repository

use crate::db::DatabasePool;
use crate::models::{CreateDomain, Domain};
use async_trait::async_trait;
use mailstead_common::types::DomainId;
use mailstead_common::{Error, Result};
use uuid::Uuid;

/// Domain repository trait
#[async_trait]
pub trait DomainRepository: Send + Sync {
    async fn create(&self, input: CreateDomain) -> Result<Domain>;
    async fn get(&self, id: DomainId) -> Result<Option<Domain>>;
    async fn get_by_name(&self, name: &str) -> Result<Option<Domain>>;
    async fn list_enabled(&self) -> Result<Vec<Domain>>;
    async fn set_enabled(&self, id: DomainId, enabled: bool) -> Result<()>;
}

/// Database domain repository
pub struct DbDomainRepository {
    pool: DatabasePool,
}

impl DbDomainRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DomainRepository for DbDomainRepository {
    async fn create(&self, input: CreateDomain) -> Result<Domain> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now();

        sqlx::query(
            r#"
            INSERT INTO domains (
                id, organization_id, name, enabled, kind, quota_bytes,
                default_mailbox_quota, antivirus, antispam, spam_threshold,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(id)
        .bind(input.organization_id)
        .bind(&input.name)
        .bind(input.enabled)
        .bind(input.kind.to_string())
        .bind(input.quota_bytes)
        .bind(input.default_mailbox_quota)
        .bind(input.antivirus)
        .bind(input.antispam)
        .bind(input.spam_threshold)
        .bind(now)
        .bind(now)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        self.get(id)
            .await?
            .ok_or_else(|| Error::Internal("Failed to create domain".to_string()))
    }

    async fn get(&self, id: DomainId) -> Result<Option<Domain>> {
        sqlx::query_as::<_, Domain>("SELECT * FROM domains WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Domain>> {
        sqlx::query_as::<_, Domain>("SELECT * FROM domains WHERE name = $1")
            .bind(name)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_enabled(&self) -> Result<Vec<Domain>> {
        sqlx::query_as::<_, Domain>(
            "SELECT * FROM domains WHERE enabled = true ORDER BY name ASC",
        )
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn set_enabled(&self, id: DomainId, enabled: bool) -> Result<()> {
        let now = chrono::Utc::now();
        sqlx::query("UPDATE domains SET enabled = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(enabled)
            .bind(now)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}
