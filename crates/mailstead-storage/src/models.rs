//! Database models

use chrono::{DateTime, Utc};
use mailstead_common::types::{
    AccountId, DomainId, DomainKind, FolderId, FolderKind, MessageRowId, OrganizationId,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Organization model
///
/// Organizations are administered by the surrounding CRUD layer; the
/// core only reads them to enforce the mailbox-count cap.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    /// Maximum active mailboxes across the organization's domains
    /// (0 = unlimited)
    pub max_mailboxes: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Domain model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Domain {
    pub id: DomainId,
    pub organization_id: OrganizationId,
    /// Unique FQDN
    pub name: String,
    pub enabled: bool,
    /// "primary", "relay", or "alias"
    pub kind: String,
    /// Domain quota in bytes (0 = unlimited)
    pub quota_bytes: i64,
    /// Default quota for new mailboxes, in bytes
    pub default_mailbox_quota: i64,
    pub antivirus: bool,
    pub antispam: bool,
    /// Spam score at or above which a message is classified spam
    pub spam_threshold: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Domain {
    /// Get domain kind enum
    pub fn kind_enum(&self) -> Option<DomainKind> {
        self.kind.parse().ok()
    }
}

/// DKIM key record, one-to-one with Domain
///
/// A disabled record with empty key material is the valid
/// "not yet configured" state, not an error.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DkimKey {
    pub domain_id: DomainId,
    pub selector: String,
    pub enabled: bool,
    /// PEM private key text, empty when not configured
    pub private_key_pem: String,
    /// DNS TXT value ("v=DKIM1; k=rsa; p=..."), empty when not configured
    pub public_key_txt: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DkimKey {
    /// Whether this key should be published in DNS
    pub fn is_published(&self) -> bool {
        self.enabled && !self.public_key_txt.is_empty()
    }
}

/// Email account model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EmailAccount {
    pub id: AccountId,
    pub domain_id: DomainId,
    /// Full address, unique
    pub address: String,
    pub quota_bytes: i64,
    pub used_bytes: i64,
    pub active: bool,
    /// Salted one-way hash for mailbox-server authentication.
    /// Distinct from any local-system login credential.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Folder model with cached counters
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub account_id: AccountId,
    pub name: String,
    /// "inbox", "sent", "drafts", "trash", "spam", or "custom"
    pub kind: String,
    pub unread_count: i32,
    pub total_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Folder {
    /// Get folder kind enum
    pub fn kind_enum(&self) -> Option<FolderKind> {
        self.kind.parse().ok()
    }
}

/// Stored message model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: MessageRowId,
    pub folder_id: FolderId,
    /// RFC 5322 Message-ID, globally unique; the dedup key
    pub message_id: String,
    pub subject: String,
    pub sender: String,
    pub sender_name: Option<String>,
    pub to_recipients: serde_json::Value,
    pub cc_recipients: serde_json::Value,
    pub bcc_recipients: serde_json::Value,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub snippet: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub size_bytes: i64,
    pub is_read: bool,
    pub is_starred: bool,
    pub is_deleted: bool,
    pub spam_score: Option<f64>,
    pub is_spam: bool,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    /// Recipient lists as vectors
    pub fn to_vec(&self) -> Vec<String> {
        serde_json::from_value(self.to_recipients.clone()).unwrap_or_default()
    }
}

/// Create organization input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrganization {
    pub name: String,
    pub max_mailboxes: i32,
}

/// Create domain input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDomain {
    pub organization_id: OrganizationId,
    pub name: String,
    pub enabled: bool,
    pub kind: DomainKind,
    pub quota_bytes: i64,
    pub default_mailbox_quota: i64,
    pub antivirus: bool,
    pub antispam: bool,
    pub spam_threshold: f64,
}

impl CreateDomain {
    /// Input for a domain with default settings
    pub fn with_defaults(organization_id: OrganizationId, name: impl Into<String>) -> Self {
        Self {
            organization_id,
            name: name.into(),
            enabled: true,
            kind: DomainKind::Primary,
            quota_bytes: 0,
            default_mailbox_quota: 1024 * 1024 * 1024,
            antivirus: true,
            antispam: true,
            spam_threshold: 5.0,
        }
    }
}

/// Upsert DKIM key input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertDkimKey {
    pub domain_id: DomainId,
    pub selector: String,
    pub enabled: bool,
    pub private_key_pem: String,
    pub public_key_txt: String,
}

/// Create email account input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEmailAccount {
    pub domain_id: DomainId,
    pub address: String,
    pub quota_bytes: i64,
    pub password_hash: String,
}

/// Create stored message input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStoredMessage {
    pub folder_id: FolderId,
    pub message_id: String,
    pub subject: String,
    pub sender: String,
    pub sender_name: Option<String>,
    pub to_recipients: Vec<String>,
    pub cc_recipients: Vec<String>,
    pub bcc_recipients: Vec<String>,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub snippet: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub size_bytes: i64,
    pub is_read: bool,
    pub spam_score: Option<f64>,
    pub is_spam: bool,
}
