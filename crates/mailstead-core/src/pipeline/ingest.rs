//! Message ingestion from the remote mailbox
//!
//! One sync call covers one folder of one mailbox, authenticated with
//! the mailbox's own credential. Messages are walked newest-first up
//! to the caller's limit; each one is parsed, classified, deduplicated
//! by Message-ID, and persisted. A failure on one message is logged
//! and skipped, never aborting the rest of the batch.

use super::session::SessionFactory;
use super::spam::{SpamClassifier, SpamHeaders};
use mail_parser::{Address, HeaderValue, Message, MessageParser};
use mailstead_common::types::{EmailAddress, FolderKind};
use mailstead_common::{Error, Result};
use mailstead_storage::models::{CreateStoredMessage, Domain, EmailAccount, Folder};
use mailstead_storage::repository::{DomainRepository, FolderRepository, MessageRepository};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Maximum snippet length in characters
const SNIPPET_CHARS: usize = 200;

/// Name of the local folder spam is routed into
const SPAM_FOLDER: &str = "Spam";

/// What one sync call did
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncReport {
    pub ingested: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// True when the run stopped early on cancellation; the messages
    /// processed so far are fully persisted
    pub cancelled: bool,
}

/// Pulls remote messages into local storage
pub struct Ingestor {
    domains: Arc<dyn DomainRepository>,
    folders: Arc<dyn FolderRepository>,
    messages: Arc<dyn MessageRepository>,
    sessions: Arc<dyn SessionFactory>,
    classifier: SpamClassifier,
}

impl Ingestor {
    pub fn new(
        domains: Arc<dyn DomainRepository>,
        folders: Arc<dyn FolderRepository>,
        messages: Arc<dyn MessageRepository>,
        sessions: Arc<dyn SessionFactory>,
    ) -> Self {
        Self {
            domains,
            folders,
            messages,
            sessions,
            classifier: SpamClassifier::new(),
        }
    }

    /// Sync one folder of one mailbox, newest messages first
    pub async fn sync(
        &self,
        account: &EmailAccount,
        folder_name: &str,
        credential: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        let domain = self
            .domains
            .get(account.domain_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Domain of {} not found", account.address)))?;

        let address: EmailAddress = account.address.parse()?;
        let mut session = self.sessions.open(&address, credential).await?;

        // Standard folders are created remotely on first use
        let remote_folders = session.list_folders().await?;
        let kind = FolderKind::from_folder_name(folder_name);
        if !remote_folders.iter().any(|f| f == folder_name) {
            if kind.is_standard() {
                session.create_folder(folder_name).await?;
            } else {
                return Err(Error::NotFound(format!(
                    "Folder {folder_name} does not exist for {}",
                    account.address
                )));
            }
        }

        let exists = session.select(folder_name).await?;
        let target = self
            .folders
            .get_or_create(account.id, folder_name, kind)
            .await?;

        let mut report = SyncReport::default();
        for seq in (1..=exists).rev().take(limit) {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let raw = match session.fetch_raw(seq).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(
                        account = %account.address,
                        folder = folder_name,
                        seq,
                        error = %e,
                        "Fetch failed, skipping message"
                    );
                    report.failed += 1;
                    continue;
                }
            };

            match self.ingest_one(account, &domain, &target, &raw).await {
                Ok(true) => report.ingested += 1,
                Ok(false) => report.duplicates += 1,
                Err(e) => {
                    warn!(
                        account = %account.address,
                        folder = folder_name,
                        seq,
                        error = %e,
                        "Ingest failed, skipping message"
                    );
                    report.failed += 1;
                }
            }
        }

        if let Err(e) = session.logout().await {
            warn!(account = %account.address, error = %e, "IMAP logout failed");
        }

        info!(
            account = %account.address,
            folder = folder_name,
            ingested = report.ingested,
            duplicates = report.duplicates,
            failed = report.failed,
            cancelled = report.cancelled,
            "Sync finished"
        );
        Ok(report)
    }

    /// Parse, classify, dedup, and persist one raw message.
    /// Returns false when the message was already stored.
    async fn ingest_one(
        &self,
        account: &EmailAccount,
        domain: &Domain,
        target: &Folder,
        raw: &[u8],
    ) -> Result<bool> {
        let parsed = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| Error::Validation("Unparsable MIME message".to_string()))?;

        let message_id = parsed
            .message_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| format!("<{}@{}>", Uuid::now_v7(), domain.name));

        // Per-message dedup, not batched, so interleaved concurrent
        // syncs stay correct
        if self
            .messages
            .exists_by_message_id(account.id, &message_id)
            .await?
        {
            return Ok(false);
        }

        let classification = if domain.antispam {
            self.classifier
                .classify(&spam_headers(&parsed), domain.spam_threshold)
        } else {
            Default::default()
        };

        // Spam lands in the Spam folder no matter where it was fetched from
        let destination = if classification.is_spam && target.kind != "spam" {
            self.folders
                .get_or_create(account.id, SPAM_FOLDER, FolderKind::Spam)
                .await?
        } else {
            target.clone()
        };

        let now = chrono::Utc::now();
        let body_text = parsed.body_text(0).map(|s| s.to_string());
        let body_html = parsed.body_html(0).map(|s| s.to_string());
        let snippet = body_text
            .as_deref()
            .or(body_html.as_deref())
            .map(|body| body.chars().take(SNIPPET_CHARS).collect::<String>());

        let (sender, sender_name) = first_address(parsed.from());
        let sent_at = parsed
            .date()
            .and_then(|d| chrono::DateTime::from_timestamp(d.to_timestamp(), 0))
            .unwrap_or(now);

        let message = self
            .messages
            .create(CreateStoredMessage {
                folder_id: destination.id,
                message_id,
                subject: parsed.subject().unwrap_or_default().to_string(),
                sender,
                sender_name,
                to_recipients: address_list(parsed.to()),
                cc_recipients: address_list(parsed.cc()),
                bcc_recipients: address_list(parsed.bcc()),
                body_text,
                body_html,
                snippet,
                sent_at,
                received_at: now,
                size_bytes: raw.len() as i64,
                is_read: false,
                spam_score: classification.score,
                is_spam: classification.is_spam,
            })
            .await?;

        self.folders.recompute_counts(message.folder_id).await?;
        Ok(true)
    }

    /// Move a remote message between folders: copy to the destination,
    /// flag the original deleted, then expunge
    pub async fn move_message(
        &self,
        account: &EmailAccount,
        credential: &str,
        from_folder: &str,
        seq: u32,
        to_folder: &str,
    ) -> Result<()> {
        let address: EmailAddress = account.address.parse()?;
        let mut session = self.sessions.open(&address, credential).await?;

        session.select(from_folder).await?;
        session.copy_message(seq, to_folder).await?;
        session.mark_deleted(seq).await?;
        session.expunge().await?;

        if let Err(e) = session.logout().await {
            warn!(account = %account.address, error = %e, "IMAP logout failed");
        }
        Ok(())
    }
}

/// Sender address and display name from the From header
fn first_address(address: Option<&Address<'_>>) -> (String, Option<String>) {
    match address.and_then(|a| a.first()) {
        Some(addr) => (
            addr.address().unwrap_or_default().to_string(),
            addr.name().map(|n| n.to_string()),
        ),
        None => (String::new(), None),
    }
}

fn address_list(address: Option<&Address<'_>>) -> Vec<String> {
    address
        .map(|a| {
            a.iter()
                .filter_map(|addr| addr.address())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn spam_headers(parsed: &Message<'_>) -> SpamHeaders {
    let text = |name: &str| -> Option<String> {
        parsed
            .header(name)
            .and_then(HeaderValue::as_text)
            .map(|s| s.to_string())
    };
    SpamHeaders {
        flag: text("X-Spam-Flag"),
        status: text("X-Spam-Status"),
        score: text("X-Spam-Score"),
        level: text("X-Spam-Level"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{FakeSessionFactory, MemStore, RemoteMailbox};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;

    fn account(domain: &Domain) -> EmailAccount {
        let now = chrono::Utc::now();
        EmailAccount {
            id: Uuid::now_v7(),
            domain_id: domain.id,
            address: "alice@example.com".to_string(),
            quota_bytes: 0,
            used_bytes: 0,
            active: true,
            password_hash: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn message(id: &str, subject: &str, extra_headers: &str) -> Vec<u8> {
        format!(
            "Message-ID: <{id}@remote.test>\r\n\
             From: Bob <bob@remote.test>\r\n\
             To: alice@example.com\r\n\
             Subject: {subject}\r\n\
             Date: Mon, 13 Jan 2025 10:30:00 +0000\r\n\
             {extra_headers}Content-Type: text/plain\r\n\
             \r\n\
             Hello Alice, this is the body.\r\n"
        )
        .into_bytes()
    }

    struct Fixture {
        store: Arc<MemStore>,
        remote: Arc<RemoteMailbox>,
        ingestor: Ingestor,
        account: EmailAccount,
    }

    fn fixture(spam_threshold: f64, antispam: bool) -> Fixture {
        let store = MemStore::new();
        let domain = store.add_domain(spam_threshold, antispam);
        let remote = RemoteMailbox::new();
        let ingestor = Ingestor::new(
            store.clone(),
            store.clone(),
            store.clone(),
            FakeSessionFactory::new(remote.clone()),
        );
        Fixture {
            account: account(&domain),
            store,
            remote,
            ingestor,
        }
    }

    #[tokio::test]
    async fn test_sync_ingests_and_extracts_fields() {
        let f = fixture(5.0, true);
        f.remote.put("INBOX", message("m1", "First", ""));

        let report = f
            .ingestor
            .sync(&f.account, "INBOX", "pw", 100, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.ingested, 1);
        let inbox = f.store.folder_named("INBOX").unwrap();
        let stored = f.store.messages_in(inbox.id);
        assert_eq!(stored.len(), 1);

        let m = &stored[0];
        assert_eq!(m.message_id, "m1@remote.test");
        assert_eq!(m.subject, "First");
        assert_eq!(m.sender, "bob@remote.test");
        assert_eq!(m.sender_name.as_deref(), Some("Bob"));
        assert_eq!(m.to_vec(), vec!["alice@example.com"]);
        assert!(m.body_text.as_deref().unwrap().contains("Hello Alice"));
        assert!(m.snippet.as_deref().unwrap().starts_with("Hello Alice"));
        assert!(!m.is_read);
        assert!(!m.is_spam);
        assert_eq!(m.sent_at.to_rfc3339(), "2025-01-13T10:30:00+00:00");
    }

    #[tokio::test]
    async fn test_duplicate_message_stored_once() {
        let f = fixture(5.0, true);
        f.remote.put("INBOX", message("dup", "Same", ""));

        let first = f
            .ingestor
            .sync(&f.account, "INBOX", "pw", 100, &CancellationToken::new())
            .await
            .unwrap();
        let second = f
            .ingestor
            .sync(&f.account, "INBOX", "pw", 100, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(first.ingested, 1);
        assert_eq!(second.ingested, 0);
        assert_eq!(second.duplicates, 1);

        let inbox = f.store.folder_named("INBOX").unwrap();
        assert_eq!(f.store.messages_in(inbox.id).len(), 1);
    }

    #[tokio::test]
    async fn test_spam_routed_to_spam_folder() {
        let f = fixture(5.0, true);
        f.remote.put(
            "INBOX",
            message("ham", "Fine", "X-Spam-Score: 1.2\r\n"),
        );
        f.remote.put(
            "INBOX",
            message("junk", "Buy now", "X-Spam-Flag: YES\r\nX-Spam-Score: 8.3\r\n"),
        );

        f.ingestor
            .sync(&f.account, "INBOX", "pw", 100, &CancellationToken::new())
            .await
            .unwrap();

        let inbox = f.store.folder_named("INBOX").unwrap();
        let spam = f.store.folder_named("Spam").unwrap();
        assert_eq!(f.store.messages_in(inbox.id).len(), 1);

        let spam_messages = f.store.messages_in(spam.id);
        assert_eq!(spam_messages.len(), 1);
        assert!(spam_messages[0].is_spam);
        assert_eq!(spam_messages[0].spam_score, Some(8.3));
    }

    #[tokio::test]
    async fn test_antispam_disabled_stores_everything_in_target() {
        let f = fixture(5.0, false);
        f.remote
            .put("INBOX", message("junk", "Buy now", "X-Spam-Flag: YES\r\n"));

        f.ingestor
            .sync(&f.account, "INBOX", "pw", 100, &CancellationToken::new())
            .await
            .unwrap();

        let inbox = f.store.folder_named("INBOX").unwrap();
        let stored = f.store.messages_in(inbox.id);
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].is_spam);
        assert!(f.store.folder_named("Spam").is_none());
    }

    #[tokio::test]
    async fn test_unparsable_message_skipped_not_fatal() {
        let f = fixture(5.0, true);
        f.remote.put("INBOX", message("ok1", "Good", ""));
        f.remote.put("INBOX", Vec::new());
        f.remote.put("INBOX", message("ok2", "Also good", ""));

        let report = f
            .ingestor
            .sync(&f.account, "INBOX", "pw", 100, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.ingested, 2);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_limit_takes_newest_first() {
        let f = fixture(5.0, true);
        for i in 0..5 {
            f.remote
                .put("INBOX", message(&format!("m{i}"), &format!("Nr {i}"), ""));
        }

        let report = f
            .ingestor
            .sync(&f.account, "INBOX", "pw", 2, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.ingested, 2);
        let inbox = f.store.folder_named("INBOX").unwrap();
        let ids: Vec<String> = f
            .store
            .messages_in(inbox.id)
            .iter()
            .map(|m| m.message_id.clone())
            .collect();
        // Highest sequence numbers are the newest
        assert_eq!(ids, vec!["m4@remote.test", "m3@remote.test"]);
    }

    #[tokio::test]
    async fn test_standard_folder_created_remotely() {
        let f = fixture(5.0, true);

        let report = f
            .ingestor
            .sync(&f.account, "Sent", "pw", 100, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.ingested, 0);
        assert!(f.remote.folders.lock().unwrap().contains_key("Sent"));
    }

    #[tokio::test]
    async fn test_missing_custom_folder_is_not_found() {
        let f = fixture(5.0, true);

        let err = f
            .ingestor
            .sync(&f.account, "Receipts", "pw", 100, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_folder_counters_track_inserts() {
        let f = fixture(5.0, true);
        f.remote.put("INBOX", message("m1", "One", ""));
        f.remote.put("INBOX", message("m2", "Two", ""));

        f.ingestor
            .sync(&f.account, "INBOX", "pw", 100, &CancellationToken::new())
            .await
            .unwrap();

        let inbox = f.store.folder_named("INBOX").unwrap();
        assert_eq!(inbox.total_count, 2);
        assert_eq!(inbox.unread_count, 2);
    }

    #[tokio::test]
    async fn test_folder_counters_track_flag_changes() {
        let f = fixture(5.0, true);
        f.remote.put("INBOX", message("m1", "One", ""));
        f.remote.put("INBOX", message("m2", "Two", ""));

        f.ingestor
            .sync(&f.account, "INBOX", "pw", 100, &CancellationToken::new())
            .await
            .unwrap();

        let inbox = f.store.folder_named("INBOX").unwrap();
        let stored = f.store.messages_in(inbox.id);

        f.store.set_read(stored[0].id, true).await.unwrap();
        let inbox = f.store.folder_named("INBOX").unwrap();
        assert_eq!(inbox.total_count, 2);
        assert_eq!(inbox.unread_count, 1);

        f.store.mark_deleted(stored[1].id).await.unwrap();
        let inbox = f.store.folder_named("INBOX").unwrap();
        assert_eq!(inbox.total_count, 1);
        assert_eq!(inbox.unread_count, 0);
    }

    #[tokio::test]
    async fn test_folder_counters_track_moves() {
        let f = fixture(5.0, true);
        f.remote.put("INBOX", message("m1", "One", ""));

        f.ingestor
            .sync(&f.account, "INBOX", "pw", 100, &CancellationToken::new())
            .await
            .unwrap();

        let inbox = f.store.folder_named("INBOX").unwrap();
        let archive = f
            .store
            .get_or_create(f.account.id, "Archive", FolderKind::Custom)
            .await
            .unwrap();
        let stored = f.store.messages_in(inbox.id);

        f.store
            .move_to_folder(stored[0].id, archive.id)
            .await
            .unwrap();

        let inbox = f.store.folder_named("INBOX").unwrap();
        let archive = f.store.folder_named("Archive").unwrap();
        assert_eq!(inbox.total_count, 0);
        assert_eq!(inbox.unread_count, 0);
        assert_eq!(archive.total_count, 1);
        assert_eq!(archive.unread_count, 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_between_messages() {
        let f = fixture(5.0, true);
        for i in 0..3 {
            f.remote
                .put("INBOX", message(&format!("m{i}"), "Subject", ""));
        }

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = f
            .ingestor
            .sync(&f.account, "INBOX", "pw", 100, &cancel)
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.ingested, 0);
    }

    #[tokio::test]
    async fn test_missing_date_falls_back_to_now() {
        let f = fixture(5.0, true);
        let raw = b"Message-ID: <nodate@remote.test>\r\n\
            From: bob@remote.test\r\n\
            To: alice@example.com\r\n\
            Subject: No date\r\n\
            \r\n\
            Body\r\n"
            .to_vec();
        f.remote.put("INBOX", raw);

        let before = chrono::Utc::now();
        f.ingestor
            .sync(&f.account, "INBOX", "pw", 100, &CancellationToken::new())
            .await
            .unwrap();

        let inbox = f.store.folder_named("INBOX").unwrap();
        let stored = f.store.messages_in(inbox.id);
        assert!(stored[0].sent_at >= before);
    }

    #[tokio::test]
    async fn test_move_message_copies_then_expunges() {
        let f = fixture(5.0, true);
        f.remote.put("INBOX", message("mv", "Move me", ""));

        f.ingestor
            .move_message(&f.account, "pw", "INBOX", 1, "Trash")
            .await
            .unwrap();

        let folders = f.remote.folders.lock().unwrap();
        assert_eq!(folders.get("INBOX").unwrap().len(), 0);
        assert_eq!(folders.get("Trash").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_open_failure_propagates() {
        let f = fixture(5.0, true);
        f.remote.fail_open.store(true, Ordering::SeqCst);

        let err = f
            .ingestor
            .sync(&f.account, "INBOX", "pw", 100, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connectivity(_)));
    }
}
