//! Domain provisioning
//!
//! Provisioning runs four steps: the local domain record, the transfer
//! agent's virtual-domain table, the per-domain storage root, and DKIM
//! key generation. Step failures after the first are logged and the
//! remaining steps still run; re-running the whole operation completes
//! whatever is missing without duplicating what already succeeded.

use super::system::{MaildirStore, TransferAgent};
use crate::dkim::{outcome_fields, DkimGenerator};
use mailstead_common::Result;
use mailstead_storage::models::{CreateDomain, Domain, UpsertDkimKey};
use mailstead_storage::repository::{DkimKeyRepository, DomainRepository};
use std::sync::Arc;
use tracing::{info, warn};

/// One of the four provisioning steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    DomainRecord,
    TransferAgent,
    StorageRoot,
    DkimKey,
}

impl ProvisionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionStep::DomainRecord => "domain_record",
            ProvisionStep::TransferAgent => "transfer_agent",
            ProvisionStep::StorageRoot => "storage_root",
            ProvisionStep::DkimKey => "dkim_key",
        }
    }
}

/// Outcome of a single step
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub step: ProvisionStep,
    pub ok: bool,
    /// Failure detail when ok is false
    pub detail: Option<String>,
}

/// Result of a provisioning run: the domain plus what each step did
#[derive(Debug, Clone)]
pub struct DomainProvision {
    pub domain: Domain,
    pub steps: Vec<StepReport>,
}

impl DomainProvision {
    /// Whether every step succeeded. When false the domain is valid
    /// and a repeat provision call is safe and completes the rest.
    pub fn complete(&self) -> bool {
        self.steps.iter().all(|s| s.ok)
    }

    pub fn failed_steps(&self) -> Vec<ProvisionStep> {
        self.steps
            .iter()
            .filter(|s| !s.ok)
            .map(|s| s.step)
            .collect()
    }
}

/// Orchestrates domain creation across the database, the transfer
/// agent, the mailbox store, and the DKIM generator
pub struct DomainProvisioner {
    domains: Arc<dyn DomainRepository>,
    dkim_keys: Arc<dyn DkimKeyRepository>,
    transfer: Arc<dyn TransferAgent>,
    maildir: Arc<dyn MaildirStore>,
    generator: DkimGenerator,
}

impl DomainProvisioner {
    pub fn new(
        domains: Arc<dyn DomainRepository>,
        dkim_keys: Arc<dyn DkimKeyRepository>,
        transfer: Arc<dyn TransferAgent>,
        maildir: Arc<dyn MaildirStore>,
        generator: DkimGenerator,
    ) -> Self {
        Self {
            domains,
            dkim_keys,
            transfer,
            maildir,
            generator,
        }
    }

    /// Provision a domain end to end
    pub async fn provision(&self, input: CreateDomain) -> Result<DomainProvision> {
        let name = input.name.clone();
        let mut steps = Vec::with_capacity(4);

        // Step 1 is fatal: without the domain record nothing else can run
        let domain = match self.domains.get_by_name(&name).await? {
            Some(existing) => {
                info!(domain = %name, "Domain record already exists, resuming provisioning");
                existing
            }
            None => self.domains.create(input).await?,
        };
        steps.push(StepReport {
            step: ProvisionStep::DomainRecord,
            ok: true,
            detail: None,
        });

        steps.push(
            self.run_step(ProvisionStep::TransferAgent, &name, async {
                self.transfer.register_domain(&name).await
            })
            .await,
        );

        steps.push(
            self.run_step(ProvisionStep::StorageRoot, &name, async {
                self.maildir.ensure_domain_root(&name).await
            })
            .await,
        );

        steps.push(self.dkim_step(&domain).await);

        let provision = DomainProvision { domain, steps };
        if provision.complete() {
            info!(domain = %name, "Domain provisioned");
        } else {
            warn!(
                domain = %name,
                failed = ?provision.failed_steps(),
                "Domain partially provisioned, re-run to complete"
            );
        }
        Ok(provision)
    }

    async fn run_step<F>(&self, step: ProvisionStep, domain: &str, work: F) -> StepReport
    where
        F: std::future::Future<Output = Result<()>>,
    {
        match work.await {
            Ok(()) => StepReport {
                step,
                ok: true,
                detail: None,
            },
            Err(e) => {
                warn!(domain, step = step.as_str(), error = %e, "Provisioning step failed");
                StepReport {
                    step,
                    ok: false,
                    detail: Some(e.to_string()),
                }
            }
        }
    }

    /// Generate and persist DKIM key material. An existing usable key
    /// is kept as-is; an Unavailable outcome is persisted as a
    /// disabled record rather than treated as a step failure.
    async fn dkim_step(&self, domain: &Domain) -> StepReport {
        let existing = match self.dkim_keys.get(domain.id).await {
            Ok(key) => key,
            Err(e) => {
                return StepReport {
                    step: ProvisionStep::DkimKey,
                    ok: false,
                    detail: Some(e.to_string()),
                }
            }
        };

        if existing.as_ref().is_some_and(|k| k.is_published()) {
            return StepReport {
                step: ProvisionStep::DkimKey,
                ok: true,
                detail: None,
            };
        }

        let outcome = self.generator.generate(&domain.name).await;
        let (enabled, private_key_pem, public_key_txt) = outcome_fields(&outcome);
        let input = UpsertDkimKey {
            domain_id: domain.id,
            selector: self.generator.selector().to_string(),
            enabled,
            private_key_pem,
            public_key_txt,
        };

        match self.dkim_keys.upsert(input).await {
            Ok(_) => StepReport {
                step: ProvisionStep::DkimKey,
                ok: true,
                detail: None,
            },
            Err(e) => StepReport {
                step: ProvisionStep::DkimKey,
                ok: false,
                detail: Some(e.to_string()),
            },
        }
    }
}
