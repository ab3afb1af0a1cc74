//! Mailbox provisioning
//!
//! Creates the account record with a salted password hash, the
//! standard folder set, the transfer-agent mailbox entry, and the
//! on-disk maildir. The organization's mailbox cap is re-checked here
//! at creation time, not only in outer layers, so concurrent creates
//! cannot slip past the limit unnoticed.

use super::system::{MaildirStore, TransferAgent};
use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
use argon2::Argon2;
use mailstead_common::types::{EmailAddress, FolderKind};
use mailstead_common::{Error, Result};
use mailstead_storage::models::{CreateEmailAccount, EmailAccount};
use mailstead_storage::repository::{
    AccountRepository, DomainRepository, FolderRepository, OrganizationRepository,
};
use std::sync::Arc;
use tracing::info;

/// Orchestrates mailbox creation across the database, the transfer
/// agent, and the mailbox store
pub struct MailboxProvisioner {
    accounts: Arc<dyn AccountRepository>,
    domains: Arc<dyn DomainRepository>,
    organizations: Arc<dyn OrganizationRepository>,
    folders: Arc<dyn FolderRepository>,
    transfer: Arc<dyn TransferAgent>,
    maildir: Arc<dyn MaildirStore>,
}

impl MailboxProvisioner {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        domains: Arc<dyn DomainRepository>,
        organizations: Arc<dyn OrganizationRepository>,
        folders: Arc<dyn FolderRepository>,
        transfer: Arc<dyn TransferAgent>,
        maildir: Arc<dyn MaildirStore>,
    ) -> Self {
        Self {
            accounts,
            domains,
            organizations,
            folders,
            transfer,
            maildir,
        }
    }

    /// Provision a mailbox under an existing, enabled domain.
    /// `quota_bytes` of None takes the domain's default mailbox quota.
    pub async fn provision(
        &self,
        address: &EmailAddress,
        password: &str,
        quota_bytes: Option<i64>,
    ) -> Result<EmailAccount> {
        let domain = self
            .domains
            .get_by_name(&address.domain)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Domain {} does not exist", address.domain)))?;

        if !domain.enabled {
            return Err(Error::Validation(format!(
                "Domain {} is disabled",
                domain.name
            )));
        }

        let full = address.to_string();
        if self.accounts.get_by_address(&full).await?.is_some() {
            return Err(Error::Validation(format!("Mailbox {full} already exists")));
        }

        self.check_mailbox_limit(&domain.organization_id).await?;

        let password_hash = hash_password(password)?;
        let account = self
            .accounts
            .create(CreateEmailAccount {
                domain_id: domain.id,
                address: full.clone(),
                quota_bytes: quota_bytes.unwrap_or(domain.default_mailbox_quota),
                password_hash,
            })
            .await?;

        for (name, kind) in FolderKind::standard_set() {
            self.folders.get_or_create(account.id, name, kind).await?;
        }

        self.transfer.register_mailbox(address).await?;
        self.maildir.ensure_maildir(address).await?;

        info!(address = %full, "Mailbox provisioned");
        Ok(account)
    }

    async fn check_mailbox_limit(&self, organization_id: &uuid::Uuid) -> Result<()> {
        let organization = self
            .organizations
            .get(*organization_id)
            .await?
            .ok_or_else(|| Error::NotFound("Organization does not exist".to_string()))?;

        // 0 means unlimited
        if organization.max_mailboxes > 0 {
            let active = self
                .organizations
                .count_active_mailboxes(organization.id)
                .await?;
            if active >= organization.max_mailboxes as i64 {
                return Err(Error::LimitExceeded(format!(
                    "Organization {} has reached its mailbox limit of {}",
                    organization.name, organization.max_mailboxes
                )));
            }
        }
        Ok(())
    }
}

/// Salted one-way hash compatible with the mailbox server's
/// authentication scheme. The plaintext is never stored.
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| Error::Internal(format!("Password hashing failed: {e}")))
}
