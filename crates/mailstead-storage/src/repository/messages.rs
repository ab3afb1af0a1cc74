//! Stored message repository

use crate::db::DatabasePool;
use crate::models::{CreateStoredMessage, StoredMessage};
use async_trait::async_trait;
use mailstead_common::types::{AccountId, FolderId, MessageRowId};
use mailstead_common::{Error, Result};
use uuid::Uuid;

/// Stored message repository trait
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, input: CreateStoredMessage) -> Result<StoredMessage>;
    async fn get(&self, id: MessageRowId) -> Result<Option<StoredMessage>>;

    /// Whether any folder of the account already holds this Message-ID.
    /// The ingest dedup check.
    async fn exists_by_message_id(&self, account_id: AccountId, message_id: &str) -> Result<bool>;

    async fn list_by_folder(&self, folder_id: FolderId) -> Result<Vec<StoredMessage>>;

    /// Flag and membership mutations keep the cached folder counters in
    /// step with the messages table.
    async fn set_read(&self, id: MessageRowId, is_read: bool) -> Result<()>;
    async fn set_starred(&self, id: MessageRowId, is_starred: bool) -> Result<()>;
    async fn move_to_folder(&self, id: MessageRowId, folder_id: FolderId) -> Result<()>;
    async fn mark_deleted(&self, id: MessageRowId) -> Result<()>;
}

/// Database stored message repository
pub struct DbMessageRepository {
    pool: DatabasePool,
}

impl DbMessageRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Restore one folder's cached counters from the messages table
    async fn refresh_counts(&self, folder_id: FolderId) -> Result<()> {
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
        .bind(folder_id)
        .bind(now)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for DbMessageRepository {
    async fn create(&self, input: CreateStoredMessage) -> Result<StoredMessage> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now();

        let to = serde_json::to_value(&input.to_recipients)
            .map_err(|e| Error::Internal(e.to_string()))?;
        let cc = serde_json::to_value(&input.cc_recipients)
            .map_err(|e| Error::Internal(e.to_string()))?;
        let bcc = serde_json::to_value(&input.bcc_recipients)
            .map_err(|e| Error::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO messages (
                id, folder_id, message_id, subject, sender, sender_name,
                to_recipients, cc_recipients, bcc_recipients,
                body_text, body_html, snippet,
                sent_at, received_at, size_bytes,
                is_read, is_starred, is_deleted, spam_score, is_spam, created_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6,
                $7, $8, $9,
                $10, $11, $12,
                $13, $14, $15,
                $16, false, false, $17, $18, $19
            )
            "#,
        )
        .bind(id)
        .bind(input.folder_id)
        .bind(&input.message_id)
        .bind(&input.subject)
        .bind(&input.sender)
        .bind(&input.sender_name)
        .bind(to)
        .bind(cc)
        .bind(bcc)
        .bind(&input.body_text)
        .bind(&input.body_html)
        .bind(&input.snippet)
        .bind(input.sent_at)
        .bind(input.received_at)
        .bind(input.size_bytes)
        .bind(input.is_read)
        .bind(input.spam_score)
        .bind(input.is_spam)
        .bind(now)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        self.get(id)
            .await?
            .ok_or_else(|| Error::Internal("Failed to create message".to_string()))
    }

    async fn get(&self, id: MessageRowId) -> Result<Option<StoredMessage>> {
        sqlx::query_as::<_, StoredMessage>("SELECT * FROM messages WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn exists_by_message_id(&self, account_id: AccountId, message_id: &str) -> Result<bool> {
        let row: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM messages m
                JOIN folders f ON f.id = m.folder_id
                WHERE f.account_id = $1 AND m.message_id = $2
            )
            "#,
        )
        .bind(account_id)
        .bind(message_id)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(row.0)
    }

    async fn list_by_folder(&self, folder_id: FolderId) -> Result<Vec<StoredMessage>> {
        sqlx::query_as::<_, StoredMessage>(
            r#"
            SELECT * FROM messages
            WHERE folder_id = $1 AND is_deleted = false
            ORDER BY received_at DESC
            "#,
        )
        .bind(folder_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn set_read(&self, id: MessageRowId, is_read: bool) -> Result<()> {
        let row: Option<(FolderId,)> =
            sqlx::query_as("UPDATE messages SET is_read = $2 WHERE id = $1 RETURNING folder_id")
                .bind(id)
                .bind(is_read)
                .fetch_optional(self.pool.pool())
                .await
                .map_err(|e| Error::Database(e.to_string()))?;

        if let Some((folder_id,)) = row {
            self.refresh_counts(folder_id).await?;
        }
        Ok(())
    }

    async fn set_starred(&self, id: MessageRowId, is_starred: bool) -> Result<()> {
        sqlx::query("UPDATE messages SET is_starred = $2 WHERE id = $1")
            .bind(id)
            .bind(is_starred)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn move_to_folder(&self, id: MessageRowId, folder_id: FolderId) -> Result<()> {
        let row: Option<(FolderId,)> =
            sqlx::query_as("SELECT folder_id FROM messages WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool.pool())
                .await
                .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query("UPDATE messages SET folder_id = $2 WHERE id = $1")
            .bind(id)
            .bind(folder_id)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        // Both sides of the move changed membership
        if let Some((previous,)) = row {
            self.refresh_counts(previous).await?;
        }
        self.refresh_counts(folder_id).await?;
        Ok(())
    }

    async fn mark_deleted(&self, id: MessageRowId) -> Result<()> {
        let row: Option<(FolderId,)> = sqlx::query_as(
            "UPDATE messages SET is_deleted = true WHERE id = $1 RETURNING folder_id",
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        if let Some((folder_id,)) = row {
            self.refresh_counts(folder_id).await?;
        }
        Ok(())
    }
}
