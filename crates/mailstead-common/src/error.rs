//! Error types for Mailstead

use thiserror::Error;

/// Main error type for Mailstead
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    /// Network or timeout failure talking to a remote service. Retryable.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Bad credential, API key, or non-whitelisted caller IP. Not
    /// retryable without operator intervention.
    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A zone write was refused because its read-before-write
    /// precondition failed. Never retried silently with stale data.
    #[error("Safety abort: {0}")]
    SafetyAbort(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Mailstead
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether retrying the same call without intervention can succeed
    pub fn retryable(&self) -> bool {
        matches!(self, Error::Connectivity(_))
    }

    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Connectivity(_) => "CONNECTIVITY_ERROR",
            Error::Authorization(_) => "UNAUTHORIZED",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::SafetyAbort(_) => "SAFETY_ABORT",
            Error::NotFound(_) => "NOT_FOUND",
            Error::LimitExceeded(_) => "LIMIT_EXCEEDED",
            Error::Smtp(_) => "SMTP_ERROR",
            Error::Imap(_) => "IMAP_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }
}
