//! Outgoing message dispatch
//!
//! Submission runs under the mailbox's own address and credential so
//! the SMTP identity lines up with the domain's SPF/DKIM records. A
//! successful transmission stores a local sent copy and then mirrors
//! the raw message into the remote Sent folder; the mirror is best
//! effort and its failure never turns a successful send into an error.

use super::session::SessionFactory;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use mailstead_common::config::SubmissionConfig;
use mailstead_common::types::{EmailAddress, FolderKind};
use mailstead_common::{Error, Result};
use mailstead_storage::models::{CreateStoredMessage, EmailAccount};
use mailstead_storage::repository::{FolderRepository, MessageRepository};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Remote folder the raw copy is appended to
const SENT_FOLDER: &str = "Sent";

/// Maximum snippet length in characters
const SNIPPET_CHARS: usize = 200;

/// An outgoing message before composition
#[derive(Debug, Clone, Default)]
pub struct OutgoingMessage {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub attachments: Vec<OutgoingAttachment>,
}

/// A file attached to an outgoing message
#[derive(Debug, Clone)]
pub struct OutgoingAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Transmission and mirror results, tracked separately
#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    /// Message-ID without angle brackets, as stored locally
    pub message_id: String,
    /// Whether the raw copy reached the remote Sent folder
    pub mirrored: bool,
}

/// Authenticated submission of a composed message
#[async_trait]
pub trait SubmissionTransport: Send + Sync {
    async fn transmit(
        &self,
        identity: &EmailAddress,
        credential: &str,
        message: &Message,
    ) -> Result<()>;
}

/// SMTP submission with a per-call transport so each send carries the
/// mailbox's own credential
pub struct SmtpSubmission {
    config: SubmissionConfig,
}

impl SmtpSubmission {
    pub fn new(config: SubmissionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SubmissionTransport for SmtpSubmission {
    async fn transmit(
        &self,
        identity: &EmailAddress,
        credential: &str,
        message: &Message,
    ) -> Result<()> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
            .map_err(|e| Error::Smtp(format!("Failed to create SMTP transport: {e}")))?
            .port(self.config.port)
            .credentials(Credentials::new(
                identity.to_string(),
                credential.to_string(),
            ))
            .timeout(Some(Duration::from_secs(self.config.timeout_secs)))
            .build();

        transport
            .send(message.clone())
            .await
            .map_err(|e| Error::Smtp(format!("Transmission failed: {e}")))?;
        Ok(())
    }
}

/// Sends mail and records the sent copy
pub struct Dispatcher {
    folders: Arc<dyn FolderRepository>,
    messages: Arc<dyn MessageRepository>,
    sessions: Arc<dyn SessionFactory>,
    transport: Arc<dyn SubmissionTransport>,
}

impl Dispatcher {
    pub fn new(
        folders: Arc<dyn FolderRepository>,
        messages: Arc<dyn MessageRepository>,
        sessions: Arc<dyn SessionFactory>,
        transport: Arc<dyn SubmissionTransport>,
    ) -> Self {
        Self {
            folders,
            messages,
            sessions,
            transport,
        }
    }

    /// Compose, transmit, store the sent copy, and mirror it remotely
    pub async fn send(
        &self,
        account: &EmailAccount,
        credential: &str,
        outgoing: OutgoingMessage,
    ) -> Result<SendOutcome> {
        if outgoing.to.is_empty() && outgoing.cc.is_empty() && outgoing.bcc.is_empty() {
            return Err(Error::Validation("No recipients".to_string()));
        }
        if outgoing.body_text.is_none() && outgoing.body_html.is_none() {
            return Err(Error::Validation("No message body".to_string()));
        }

        let address: EmailAddress = account.address.parse()?;
        let message_id = format!("{}@{}", Uuid::now_v7(), address.domain);
        let message = compose(&address, &message_id, &outgoing)?;
        let raw = message.formatted();

        self.transport
            .transmit(&address, credential, &message)
            .await?;
        info!(account = %account.address, message_id, "Message transmitted");

        self.store_sent_copy(account, &message_id, &outgoing, raw.len() as i64)
            .await?;

        let mirrored = self.mirror(account, &address, credential, &raw).await;
        Ok(SendOutcome {
            message_id,
            mirrored,
        })
    }

    async fn store_sent_copy(
        &self,
        account: &EmailAccount,
        message_id: &str,
        outgoing: &OutgoingMessage,
        size_bytes: i64,
    ) -> Result<()> {
        let sent = self
            .folders
            .get_or_create(account.id, SENT_FOLDER, FolderKind::Sent)
            .await?;

        let now = chrono::Utc::now();
        let snippet = outgoing
            .body_text
            .as_deref()
            .or(outgoing.body_html.as_deref())
            .map(|body| body.chars().take(SNIPPET_CHARS).collect::<String>());

        self.messages
            .create(CreateStoredMessage {
                folder_id: sent.id,
                message_id: message_id.to_string(),
                subject: outgoing.subject.clone(),
                sender: account.address.clone(),
                sender_name: None,
                to_recipients: outgoing.to.clone(),
                cc_recipients: outgoing.cc.clone(),
                bcc_recipients: outgoing.bcc.clone(),
                body_text: outgoing.body_text.clone(),
                body_html: outgoing.body_html.clone(),
                snippet,
                sent_at: now,
                received_at: now,
                size_bytes,
                is_read: true,
                spam_score: None,
                is_spam: false,
            })
            .await?;

        self.folders.recompute_counts(sent.id).await?;
        Ok(())
    }

    /// Append the raw message to the remote Sent folder. Failures are
    /// logged, never propagated.
    async fn mirror(
        &self,
        account: &EmailAccount,
        address: &EmailAddress,
        credential: &str,
        raw: &[u8],
    ) -> bool {
        let result = async {
            let mut session = self.sessions.open(address, credential).await?;
            let folders = session.list_folders().await?;
            if !folders.iter().any(|f| f == SENT_FOLDER) {
                session.create_folder(SENT_FOLDER).await?;
            }
            session.append(SENT_FOLDER, raw).await?;
            if let Err(e) = session.logout().await {
                warn!(account = %account.address, error = %e, "IMAP logout failed");
            }
            Ok::<_, Error>(())
        }
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    account = %account.address,
                    error = %e,
                    "Sent-folder mirror failed, message was still transmitted"
                );
                false
            }
        }
    }
}

/// Build the MIME message, multipart-alternative when both bodies exist
fn compose(from: &EmailAddress, message_id: &str, outgoing: &OutgoingMessage) -> Result<Message> {
    let from_mailbox: Mailbox = from
        .to_string()
        .parse()
        .map_err(|e| Error::Validation(format!("Invalid sender address: {e}")))?;

    let mut builder = Message::builder()
        .from(from_mailbox)
        .subject(&outgoing.subject)
        .message_id(Some(format!("<{message_id}>")));

    for recipient in &outgoing.to {
        builder = builder.to(parse_mailbox(recipient)?);
    }
    for recipient in &outgoing.cc {
        builder = builder.cc(parse_mailbox(recipient)?);
    }
    for recipient in &outgoing.bcc {
        builder = builder.bcc(parse_mailbox(recipient)?);
    }

    let body = match (&outgoing.body_text, &outgoing.body_html) {
        (Some(text), Some(html)) => BodyPart::Alternative(
            MultiPart::alternative()
                .singlepart(SinglePart::plain(text.clone()))
                .singlepart(SinglePart::html(html.clone())),
        ),
        (Some(text), None) => BodyPart::Single(SinglePart::plain(text.clone())),
        (None, Some(html)) => BodyPart::Single(SinglePart::html(html.clone())),
        (None, None) => return Err(Error::Validation("No message body".to_string())),
    };

    let message = if outgoing.attachments.is_empty() {
        match body {
            BodyPart::Alternative(parts) => builder.multipart(parts),
            BodyPart::Single(part) => builder.singlepart(part),
        }
    } else {
        let mut mixed = match body {
            BodyPart::Alternative(parts) => MultiPart::mixed().multipart(parts),
            BodyPart::Single(part) => MultiPart::mixed().singlepart(part),
        };
        for attachment in &outgoing.attachments {
            let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                Error::Validation(format!(
                    "Invalid content type for {}: {e}",
                    attachment.filename
                ))
            })?;
            mixed = mixed.singlepart(
                Attachment::new(attachment.filename.clone())
                    .body(attachment.data.clone(), content_type),
            );
        }
        builder.multipart(mixed)
    };

    message.map_err(|e| Error::Validation(format!("Failed to build message: {e}")))
}

enum BodyPart {
    Alternative(MultiPart),
    Single(SinglePart),
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| Error::Validation(format!("Invalid recipient {address}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{FakeSessionFactory, MemStore, RemoteMailbox};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct FakeTransport {
        sent: Mutex<Vec<(String, Vec<u8>)>>,
        fail: AtomicBool,
    }

    impl FakeTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl SubmissionTransport for FakeTransport {
        async fn transmit(
            &self,
            identity: &EmailAddress,
            _credential: &str,
            message: &Message,
        ) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Smtp("550 rejected".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((identity.to_string(), message.formatted()));
            Ok(())
        }
    }

    fn account() -> EmailAccount {
        let now = chrono::Utc::now();
        EmailAccount {
            id: Uuid::now_v7(),
            domain_id: Uuid::now_v7(),
            address: "alice@example.com".to_string(),
            quota_bytes: 0,
            used_bytes: 0,
            active: true,
            password_hash: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn dispatcher(
        store: &Arc<MemStore>,
        remote: &Arc<RemoteMailbox>,
        transport: &Arc<FakeTransport>,
    ) -> Dispatcher {
        Dispatcher::new(
            store.clone(),
            store.clone(),
            FakeSessionFactory::new(remote.clone()),
            transport.clone(),
        )
    }

    fn outgoing() -> OutgoingMessage {
        OutgoingMessage {
            to: vec!["bob@remote.test".to_string()],
            subject: "Greetings".to_string(),
            body_text: Some("Hello Bob".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn send_stores_read_sent_copy_and_mirrors() {
        let store = MemStore::new();
        let remote = RemoteMailbox::new();
        let transport = FakeTransport::new();
        let dispatcher = dispatcher(&store, &remote, &transport);

        let outcome = dispatcher
            .send(&account(), "secret", outgoing())
            .await
            .unwrap();

        assert!(outcome.mirrored);
        assert!(outcome.message_id.ends_with("@example.com"));
        assert_eq!(transport.sent.lock().unwrap().len(), 1);

        let sent = store.folder_named(SENT_FOLDER).unwrap();
        let stored = store.messages_in(sent.id);
        assert_eq!(stored.len(), 1);
        assert!(stored[0].is_read);
        assert_eq!(stored[0].message_id, outcome.message_id);
        assert_eq!(stored[0].sender, "alice@example.com");
        assert_eq!(stored[0].snippet.as_deref(), Some("Hello Bob"));

        let sent = store.folder_named(SENT_FOLDER).unwrap();
        assert_eq!(sent.total_count, 1);
        assert_eq!(sent.unread_count, 0);

        let appended = remote.appended.lock().unwrap();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].0, SENT_FOLDER);
    }

    #[tokio::test]
    async fn mirror_failure_does_not_fail_the_send() {
        let store = MemStore::new();
        let remote = RemoteMailbox::new();
        remote.fail_append.store(true, Ordering::SeqCst);
        let transport = FakeTransport::new();
        let dispatcher = dispatcher(&store, &remote, &transport);

        let outcome = dispatcher
            .send(&account(), "secret", outgoing())
            .await
            .unwrap();

        assert!(!outcome.mirrored);
        let sent = store.folder_named(SENT_FOLDER).unwrap();
        assert_eq!(store.messages_in(sent.id).len(), 1);
    }

    #[tokio::test]
    async fn transmit_failure_stores_nothing() {
        let store = MemStore::new();
        let remote = RemoteMailbox::new();
        let transport = FakeTransport::new();
        transport.fail.store(true, Ordering::SeqCst);
        let dispatcher = dispatcher(&store, &remote, &transport);

        let result = dispatcher.send(&account(), "secret", outgoing()).await;

        assert!(matches!(result, Err(Error::Smtp(_))));
        assert!(store.folder_named(SENT_FOLDER).is_none());
        assert!(store.messages.lock().unwrap().is_empty());
        assert!(remote.appended.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn both_bodies_compose_multipart_alternative() {
        let store = MemStore::new();
        let remote = RemoteMailbox::new();
        let transport = FakeTransport::new();
        let dispatcher = dispatcher(&store, &remote, &transport);

        let mut message = outgoing();
        message.body_html = Some("<p>Hello Bob</p>".to_string());
        dispatcher.send(&account(), "secret", message).await.unwrap();

        let sent = transport.sent.lock().unwrap();
        let raw = String::from_utf8_lossy(&sent[0].1);
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("Hello Bob"));
        assert!(raw.contains("<p>Hello Bob</p>"));
    }

    #[tokio::test]
    async fn attachments_compose_multipart_mixed() {
        let store = MemStore::new();
        let remote = RemoteMailbox::new();
        let transport = FakeTransport::new();
        let dispatcher = dispatcher(&store, &remote, &transport);

        let mut message = outgoing();
        message.attachments.push(OutgoingAttachment {
            filename: "notes.txt".to_string(),
            content_type: "text/plain".to_string(),
            data: b"meeting notes".to_vec(),
        });
        dispatcher.send(&account(), "secret", message).await.unwrap();

        let sent = transport.sent.lock().unwrap();
        let raw = String::from_utf8_lossy(&sent[0].1);
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("notes.txt"));
    }

    #[tokio::test]
    async fn rejects_empty_recipient_list() {
        let store = MemStore::new();
        let remote = RemoteMailbox::new();
        let transport = FakeTransport::new();
        let dispatcher = dispatcher(&store, &remote, &transport);

        let mut message = outgoing();
        message.to.clear();
        let result = dispatcher.send(&account(), "secret", message).await;

        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn mirror_creates_sent_folder_when_missing() {
        let store = MemStore::new();
        let remote = RemoteMailbox::new();
        let transport = FakeTransport::new();
        let dispatcher = dispatcher(&store, &remote, &transport);

        assert!(!remote.folders.lock().unwrap().contains_key(SENT_FOLDER));
        let outcome = dispatcher
            .send(&account(), "secret", outgoing())
            .await
            .unwrap();

        assert!(outcome.mirrored);
        let folders = remote.folders.lock().unwrap();
        assert_eq!(folders.get(SENT_FOLDER).map(Vec::len), Some(1));
    }
}
