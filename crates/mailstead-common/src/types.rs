//! Common types for Mailstead

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for organizations
pub type OrganizationId = Uuid;

/// Unique identifier for domains
pub type DomainId = Uuid;

/// Unique identifier for email accounts
pub type AccountId = Uuid;

/// Unique identifier for folders
pub type FolderId = Uuid;

/// Unique identifier for stored messages
pub type MessageRowId = Uuid;

/// Email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress {
    pub local: String,
    pub domain: String,
}

impl EmailAddress {
    /// Create a new email address
    pub fn new(local: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            domain: domain.into(),
        }
    }

    /// Parse an email address from a string
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.splitn(2, '@').collect();
        if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
            Some(Self::new(parts[0], parts[1]))
        } else {
            None
        }
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

impl std::str::FromStr for EmailAddress {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| crate::Error::Validation("Invalid email address".to_string()))
    }
}

/// Domain kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    Primary,
    Relay,
    Alias,
}

impl std::fmt::Display for DomainKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainKind::Primary => write!(f, "primary"),
            DomainKind::Relay => write!(f, "relay"),
            DomainKind::Alias => write!(f, "alias"),
        }
    }
}

impl std::str::FromStr for DomainKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(DomainKind::Primary),
            "relay" => Ok(DomainKind::Relay),
            "alias" => Ok(DomainKind::Alias),
            _ => Err(format!("Invalid domain kind: {}", s)),
        }
    }
}

/// Folder kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderKind {
    Inbox,
    Sent,
    Drafts,
    Trash,
    Spam,
    Custom,
}

impl FolderKind {
    /// Map a remote folder name onto its kind
    pub fn from_folder_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "INBOX" => FolderKind::Inbox,
            "SENT" => FolderKind::Sent,
            "DRAFTS" => FolderKind::Drafts,
            "TRASH" | "DELETED" => FolderKind::Trash,
            "SPAM" | "JUNK" => FolderKind::Spam,
            _ => FolderKind::Custom,
        }
    }

    /// The standard folders a mailbox starts with
    pub fn standard_set() -> [(&'static str, FolderKind); 5] {
        [
            ("INBOX", FolderKind::Inbox),
            ("Sent", FolderKind::Sent),
            ("Drafts", FolderKind::Drafts),
            ("Trash", FolderKind::Trash),
            ("Spam", FolderKind::Spam),
        ]
    }

    /// Whether the folder should be created remotely if missing
    pub fn is_standard(&self) -> bool {
        !matches!(self, FolderKind::Custom)
    }
}

impl std::fmt::Display for FolderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FolderKind::Inbox => write!(f, "inbox"),
            FolderKind::Sent => write!(f, "sent"),
            FolderKind::Drafts => write!(f, "drafts"),
            FolderKind::Trash => write!(f, "trash"),
            FolderKind::Spam => write!(f, "spam"),
            FolderKind::Custom => write!(f, "custom"),
        }
    }
}

impl std::str::FromStr for FolderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbox" => Ok(FolderKind::Inbox),
            "sent" => Ok(FolderKind::Sent),
            "drafts" => Ok(FolderKind::Drafts),
            "trash" => Ok(FolderKind::Trash),
            "spam" => Ok(FolderKind::Spam),
            "custom" => Ok(FolderKind::Custom),
            _ => Err(format!("Invalid folder kind: {}", s)),
        }
    }
}

/// Spam classification attached to an ingested message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SpamClassification {
    /// Numeric score parsed from transport headers, if any
    pub score: Option<f64>,

    /// Final verdict after header flags and the domain threshold
    pub is_spam: bool,
}
