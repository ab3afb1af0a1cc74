//! Message ingestion and dispatch
//!
//! Ingestion pulls messages from the remote mailbox over the retrieval
//! protocol, parses and classifies them, and persists them with
//! per-message dedup. Dispatch submits outgoing mail under the
//! mailbox's own identity and mirrors the raw message into the remote
//! Sent folder on a best-effort basis.

pub mod dispatch;
pub mod ingest;
pub mod session;
pub mod spam;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatch::{Dispatcher, OutgoingAttachment, OutgoingMessage, SendOutcome};
pub use ingest::{Ingestor, SyncReport};
pub use session::{ImapSession, ImapSessionFactory, MailSession, SessionFactory};
pub use spam::SpamClassifier;
