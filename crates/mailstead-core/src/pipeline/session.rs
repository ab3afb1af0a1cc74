//! Retrieval-protocol sessions
//!
//! The pipeline talks to the remote mailbox through the MailSession
//! trait so ingestion and dispatch can be exercised against an
//! in-memory fake. ImapSession is the production implementation over
//! an implicit-TLS IMAP connection, with an explicit timeout on every
//! remote operation.

use async_native_tls::{TlsConnector, TlsStream};
use async_trait::async_trait;
use futures::TryStreamExt;
use mailstead_common::config::ImapConfig;
use mailstead_common::types::EmailAddress;
use mailstead_common::{Error, Result};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Mailbox-retrieval operations used by the pipeline
#[async_trait]
pub trait MailSession: Send {
    async fn list_folders(&mut self) -> Result<Vec<String>>;
    async fn create_folder(&mut self, name: &str) -> Result<()>;
    /// Select a folder, returning its message count
    async fn select(&mut self, folder: &str) -> Result<u32>;
    /// Fetch the raw RFC 5322 content of one message by sequence number
    async fn fetch_raw(&mut self, seq: u32) -> Result<Vec<u8>>;
    async fn append(&mut self, folder: &str, raw: &[u8]) -> Result<()>;
    async fn copy_message(&mut self, seq: u32, folder: &str) -> Result<()>;
    async fn mark_deleted(&mut self, seq: u32) -> Result<()>;
    async fn expunge(&mut self) -> Result<()>;
    async fn logout(&mut self) -> Result<()>;
}

/// Opens authenticated sessions for a mailbox's own credential
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, address: &EmailAddress, password: &str) -> Result<Box<dyn MailSession>>;
}

type ImapInner = async_imap::Session<TlsStream<TcpStream>>;

/// Production IMAP session over implicit TLS
pub struct ImapSession {
    session: ImapInner,
    timeout: Duration,
}

impl ImapSession {
    /// Connect and authenticate as the given mailbox
    pub async fn connect(
        config: &ImapConfig,
        address: &EmailAddress,
        password: &str,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);

        let session = tokio::time::timeout(timeout, async {
            let tcp = TcpStream::connect((config.host.as_str(), config.port))
                .await
                .map_err(|e| Error::Connectivity(format!("IMAP connect failed: {e}")))?;

            let tls = TlsConnector::new()
                .connect(&config.host, tcp)
                .await
                .map_err(|e| Error::Connectivity(format!("IMAP TLS handshake failed: {e}")))?;

            let client = async_imap::Client::new(tls);
            client
                .login(address.to_string(), password)
                .await
                .map_err(|(e, _)| Error::Authorization(format!("IMAP login failed: {e}")))
        })
        .await
        .map_err(|_| Error::Connectivity("IMAP connect timed out".to_string()))??;

        debug!(address = %address, "IMAP session established");
        Ok(Self { session, timeout })
    }
}

#[async_trait]
impl MailSession for ImapSession {
    async fn list_folders(&mut self) -> Result<Vec<String>> {
        let timeout = self.timeout;
        let names = tokio::time::timeout(timeout, async {
            let stream = self.session.list(Some(""), Some("*")).await?;
            let names: Vec<_> = stream.try_collect().await?;
            Ok::<_, async_imap::error::Error>(names)
        })
        .await
        .map_err(|_| Error::Connectivity("IMAP list timed out".to_string()))?
        .map_err(|e| Error::Imap(format!("IMAP list failed: {e}")))?;

        Ok(names.into_iter().map(|n| n.name().to_string()).collect())
    }

    async fn create_folder(&mut self, name: &str) -> Result<()> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, self.session.create(name))
            .await
            .map_err(|_| Error::Connectivity("IMAP create timed out".to_string()))?
            .map_err(|e| Error::Imap(format!("IMAP create failed: {e}")))
    }

    async fn select(&mut self, folder: &str) -> Result<u32> {
        let timeout = self.timeout;
        let mailbox = tokio::time::timeout(timeout, self.session.select(folder))
            .await
            .map_err(|_| Error::Connectivity("IMAP select timed out".to_string()))?
            .map_err(|e| Error::Imap(format!("IMAP select of {folder} failed: {e}")))?;
        Ok(mailbox.exists)
    }

    async fn fetch_raw(&mut self, seq: u32) -> Result<Vec<u8>> {
        let timeout = self.timeout;
        let fetches = tokio::time::timeout(timeout, async {
            let stream = self.session.fetch(seq.to_string(), "RFC822").await?;
            let fetches: Vec<_> = stream.try_collect().await?;
            Ok::<_, async_imap::error::Error>(fetches)
        })
        .await
        .map_err(|_| Error::Connectivity("IMAP fetch timed out".to_string()))?
        .map_err(|e| Error::Imap(format!("IMAP fetch of {seq} failed: {e}")))?;

        fetches
            .into_iter()
            .next()
            .and_then(|f| f.body().map(|b| b.to_vec()))
            .ok_or_else(|| Error::Imap(format!("Message {seq} has no content")))
    }

    async fn append(&mut self, folder: &str, raw: &[u8]) -> Result<()> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, self.session.append(folder, raw))
            .await
            .map_err(|_| Error::Connectivity("IMAP append timed out".to_string()))?
            .map_err(|e| Error::Imap(format!("IMAP append to {folder} failed: {e}")))
    }

    async fn copy_message(&mut self, seq: u32, folder: &str) -> Result<()> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, self.session.copy(seq.to_string(), folder))
            .await
            .map_err(|_| Error::Connectivity("IMAP copy timed out".to_string()))?
            .map_err(|e| Error::Imap(format!("IMAP copy to {folder} failed: {e}")))
    }

    async fn mark_deleted(&mut self, seq: u32) -> Result<()> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, async {
            let stream = self
                .session
                .store(seq.to_string(), "+FLAGS (\\Deleted)")
                .await?;
            let _updates: Vec<_> = stream.try_collect().await?;
            Ok::<_, async_imap::error::Error>(())
        })
        .await
        .map_err(|_| Error::Connectivity("IMAP store timed out".to_string()))?
        .map_err(|e| Error::Imap(format!("IMAP store on {seq} failed: {e}")))
    }

    async fn expunge(&mut self) -> Result<()> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, async {
            let stream = self.session.expunge().await?;
            let _removed: Vec<_> = stream.try_collect().await?;
            Ok::<_, async_imap::error::Error>(())
        })
        .await
        .map_err(|_| Error::Connectivity("IMAP expunge timed out".to_string()))?
        .map_err(|e| Error::Imap(format!("IMAP expunge failed: {e}")))
    }

    async fn logout(&mut self) -> Result<()> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, self.session.logout())
            .await
            .map_err(|_| Error::Connectivity("IMAP logout timed out".to_string()))?
            .map_err(|e| Error::Imap(format!("IMAP logout failed: {e}")))
    }
}

/// Factory producing ImapSession connections from the shared config
pub struct ImapSessionFactory {
    config: ImapConfig,
}

impl ImapSessionFactory {
    pub fn new(config: ImapConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for ImapSessionFactory {
    async fn open(&self, address: &EmailAddress, password: &str) -> Result<Box<dyn MailSession>> {
        let session = ImapSession::connect(&self.config, address, password).await?;
        Ok(Box::new(session))
    }
}
