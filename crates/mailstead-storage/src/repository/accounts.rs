//! Email account repository

use crate::db::DatabasePool;
use crate::models::{CreateEmailAccount, EmailAccount};
use async_trait::async_trait;
use mailstead_common::types::{AccountId, DomainId};
use mailstead_common::{Error, Result};
use uuid::Uuid;

/// Email account repository trait
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn create(&self, input: CreateEmailAccount) -> Result<EmailAccount>;
    async fn get(&self, id: AccountId) -> Result<Option<EmailAccount>>;
    async fn get_by_address(&self, address: &str) -> Result<Option<EmailAccount>>;
    async fn list_by_domain(&self, domain_id: DomainId) -> Result<Vec<EmailAccount>>;
    async fn set_active(&self, id: AccountId, active: bool) -> Result<()>;
    async fn set_used_bytes(&self, id: AccountId, used_bytes: i64) -> Result<()>;
}

/// Database email account repository
pub struct DbAccountRepository {
    pool: DatabasePool,
}

impl DbAccountRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for DbAccountRepository {
    async fn create(&self, input: CreateEmailAccount) -> Result<EmailAccount> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now();

        sqlx::query(
            r#"
            INSERT INTO email_accounts (
                id, domain_id, address, quota_bytes, used_bytes, active,
                password_hash, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, 0, true, $5, $6, $6)
            "#,
        )
        .bind(id)
        .bind(input.domain_id)
        .bind(&input.address)
        .bind(input.quota_bytes)
        .bind(&input.password_hash)
        .bind(now)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        self.get(id)
            .await?
            .ok_or_else(|| Error::Internal("Failed to create email account".to_string()))
    }

    async fn get(&self, id: AccountId) -> Result<Option<EmailAccount>> {
        sqlx::query_as::<_, EmailAccount>("SELECT * FROM email_accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get_by_address(&self, address: &str) -> Result<Option<EmailAccount>> {
        sqlx::query_as::<_, EmailAccount>("SELECT * FROM email_accounts WHERE address = $1")
            .bind(address)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_by_domain(&self, domain_id: DomainId) -> Result<Vec<EmailAccount>> {
        sqlx::query_as::<_, EmailAccount>(
            "SELECT * FROM email_accounts WHERE domain_id = $1 ORDER BY address ASC",
        )
        .bind(domain_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn set_active(&self, id: AccountId, active: bool) -> Result<()> {
        let now = chrono::Utc::now();
        sqlx::query("UPDATE email_accounts SET active = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(active)
            .bind(now)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn set_used_bytes(&self, id: AccountId, used_bytes: i64) -> Result<()> {
        let now = chrono::Utc::now();
        sqlx::query("UPDATE email_accounts SET used_bytes = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(used_bytes)
            .bind(now)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}
