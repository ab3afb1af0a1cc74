//! Transfer-agent tables and mailbox-server storage layout

use async_trait::async_trait;
use mailstead_common::config::MailServerConfig;
use mailstead_common::types::EmailAddress;
use mailstead_common::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Registration with the mail-transfer agent's lookup tables.
/// Both operations are no-ops when the entry is already present.
#[async_trait]
pub trait TransferAgent: Send + Sync {
    async fn register_domain(&self, domain: &str) -> Result<()>;
    async fn register_mailbox(&self, address: &EmailAddress) -> Result<()>;
}

/// Per-domain, per-mailbox directory tree on the mailbox server
#[async_trait]
pub trait MaildirStore: Send + Sync {
    async fn ensure_domain_root(&self, domain: &str) -> Result<()>;
    async fn ensure_maildir(&self, address: &EmailAddress) -> Result<()>;
}

/// Transfer agent backed by postfix-style append-only text tables.
/// Table edits take effect after the configured reload command runs.
pub struct PostfixTables {
    config: MailServerConfig,
}

impl PostfixTables {
    pub fn new(config: MailServerConfig) -> Self {
        Self { config }
    }

    /// Append a line to a table file unless an entry with the same key
    /// already exists
    async fn append_if_absent(&self, file: &Path, key: &str, line: &str) -> Result<bool> {
        let existing = match tokio::fs::read_to_string(file).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(Error::Internal(format!(
                    "Failed to read {}: {e}",
                    file.display()
                )))
            }
        };

        let present = existing
            .lines()
            .any(|l| l.split_whitespace().next() == Some(key));
        if present {
            debug!(file = %file.display(), key, "Table entry already present");
            return Ok(false);
        }

        let mut handle = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file)
            .await
            .map_err(|e| Error::Internal(format!("Failed to open {}: {e}", file.display())))?;
        handle
            .write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|e| Error::Internal(format!("Failed to write {}: {e}", file.display())))?;

        Ok(true)
    }

    async fn reload(&self) -> Result<()> {
        let Some((program, args)) = self.config.reload_command.split_first() else {
            return Ok(());
        };

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::Internal(format!("Failed to run {program}: {e}")))?;

        if !output.status.success() {
            return Err(Error::Internal(format!(
                "Reload command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TransferAgent for PostfixTables {
    async fn register_domain(&self, domain: &str) -> Result<()> {
        let appended = self
            .append_if_absent(
                &self.config.virtual_domains_file,
                domain,
                &format!("{domain} OK"),
            )
            .await?;
        if appended {
            info!(domain, "Registered virtual domain");
            self.reload().await?;
        }
        Ok(())
    }

    async fn register_mailbox(&self, address: &EmailAddress) -> Result<()> {
        let full = address.to_string();
        let appended = self
            .append_if_absent(
                &self.config.virtual_mailboxes_file,
                &full,
                &format!("{full} {}/{}/Maildir/", address.domain, address.local),
            )
            .await?;
        if appended {
            info!(address = %full, "Registered virtual mailbox");
            self.reload().await?;
        }
        Ok(())
    }
}

/// Filesystem maildir store rooted at the configured base directory
pub struct FsMaildirStore {
    base: PathBuf,
}

impl FsMaildirStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn maildir_path(&self, address: &EmailAddress) -> PathBuf {
        self.base
            .join(&address.domain)
            .join(&address.local)
            .join("Maildir")
    }
}

#[async_trait]
impl MaildirStore for FsMaildirStore {
    async fn ensure_domain_root(&self, domain: &str) -> Result<()> {
        let path = self.base.join(domain);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| Error::Internal(format!("Failed to create {}: {e}", path.display())))?;
        Ok(())
    }

    async fn ensure_maildir(&self, address: &EmailAddress) -> Result<()> {
        let maildir = self.maildir_path(address);
        for sub in ["cur", "new", "tmp"] {
            let path = maildir.join(sub);
            tokio::fs::create_dir_all(&path)
                .await
                .map_err(|e| Error::Internal(format!("Failed to create {}: {e}", path.display())))?;
        }
        debug!(maildir = %maildir.display(), "Maildir ready");
        Ok(())
    }
}
