//! DKIM key repository

use crate::db::DatabasePool;
use crate::models::{DkimKey, UpsertDkimKey};
use async_trait::async_trait;
use mailstead_common::types::DomainId;
use mailstead_common::{Error, Result};

/// DKIM key repository trait
#[async_trait]
pub trait DkimKeyRepository: Send + Sync {
    /// Insert or replace the domain's single DKIM record
    async fn upsert(&self, input: UpsertDkimKey) -> Result<DkimKey>;
    async fn get(&self, domain_id: DomainId) -> Result<Option<DkimKey>>;
    async fn set_enabled(&self, domain_id: DomainId, enabled: bool) -> Result<()>;
}

/// Database DKIM key repository
pub struct DbDkimKeyRepository {
    pool: DatabasePool,
}

impl DbDkimKeyRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DkimKeyRepository for DbDkimKeyRepository {
    async fn upsert(&self, input: UpsertDkimKey) -> Result<DkimKey> {
        let now = chrono::Utc::now();

        sqlx::query(
            r#"
            INSERT INTO dkim_keys (
                domain_id, selector, enabled, private_key_pem, public_key_txt,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (domain_id) DO UPDATE SET
                selector = EXCLUDED.selector,
                enabled = EXCLUDED.enabled,
                private_key_pem = EXCLUDED.private_key_pem,
                public_key_txt = EXCLUDED.public_key_txt,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(input.domain_id)
        .bind(&input.selector)
        .bind(input.enabled)
        .bind(&input.private_key_pem)
        .bind(&input.public_key_txt)
        .bind(now)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        self.get(input.domain_id)
            .await?
            .ok_or_else(|| Error::Internal("Failed to upsert DKIM key".to_string()))
    }

    async fn get(&self, domain_id: DomainId) -> Result<Option<DkimKey>> {
        sqlx::query_as::<_, DkimKey>("SELECT * FROM dkim_keys WHERE domain_id = $1")
            .bind(domain_id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn set_enabled(&self, domain_id: DomainId, enabled: bool) -> Result<()> {
        let now = chrono::Utc::now();
        sqlx::query("UPDATE dkim_keys SET enabled = $2, updated_at = $3 WHERE domain_id = $1")
            .bind(domain_id)
            .bind(enabled)
            .bind(now)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}
