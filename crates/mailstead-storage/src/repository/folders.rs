//! Folder repository

use crate::db::DatabasePool;
use crate::models::Folder;
use async_trait::async_trait;
use mailstead_common::types::{AccountId, FolderId, FolderKind};
use mailstead_common::{Error, Result};
use uuid::Uuid;

/// Folder repository trait
#[async_trait]
pub trait FolderRepository: Send + Sync {
    /// Fetch a folder by account and name, creating it when absent.
    /// Concurrent callers racing on the same name both get the same row.
    async fn get_or_create(
        &self,
        account_id: AccountId,
        name: &str,
        kind: FolderKind,
    ) -> Result<Folder>;
    async fn get(&self, id: FolderId) -> Result<Option<Folder>>;
    async fn get_by_name(&self, account_id: AccountId, name: &str) -> Result<Option<Folder>>;
    async fn list_by_account(&self, account_id: AccountId) -> Result<Vec<Folder>>;

    /// Recompute the cached counters from the messages table.
    /// Deleted messages are excluded from both counts.
    async fn recompute_counts(&self, id: FolderId) -> Result<()>;
}

/// Database folder repository
pub struct DbFolderRepository {
    pool: DatabasePool,
}

impl DbFolderRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FolderRepository for DbFolderRepository {
    async fn get_or_create(
        &self,
        account_id: AccountId,
        name: &str,
        kind: FolderKind,
    ) -> Result<Folder> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now();

        sqlx::query(
            r#"
            INSERT INTO folders (id, account_id, name, kind, unread_count, total_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 0, 0, $5, $5)
            ON CONFLICT (account_id, name) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(account_id)
        .bind(name)
        .bind(kind.to_string())
        .bind(now)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        self.get_by_name(account_id, name)
            .await?
            .ok_or_else(|| Error::Internal(format!("Failed to create folder {name}")))
    }

    async fn get(&self, id: FolderId) -> Result<Option<Folder>> {
        sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get_by_name(&self, account_id: AccountId, name: &str) -> Result<Option<Folder>> {
        sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders WHERE account_id = $1 AND name = $2",
        )
        .bind(account_id)
        .bind(name)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_by_account(&self, account_id: AccountId) -> Result<Vec<Folder>> {
        sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders WHERE account_id = $1 ORDER BY name ASC",
        )
        .bind(account_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn recompute_counts(&self, id: FolderId) -> Result<()> {
        let now = chrono::Utc::now();
        sqlx::query(
            r#"
            UPDATE folders SET
                total_count = (
                    SELECT COUNT(*) FROM messages
                    WHERE folder_id = $1 AND is_deleted = false
                ),
                unread_count = (
                    SELECT COUNT(*) FROM messages
                    WHERE folder_id = $1 AND is_deleted = false AND is_read = false
                ),
                updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}
