//! Live DNS verification of published mail records
//!
//! Queries public DNS for the records a domain should be serving and
//! reports which of them have propagated. Used after reconciliation to
//! confirm the registrar write actually took effect.

use super::records::{DesiredRecords, DkimStatus};
use mailstead_common::{Error, Result};
use mailstead_storage::models::Domain;
use tracing::debug;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Per-record-type verification outcome
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyReport {
    pub mx_ok: bool,
    pub spf_ok: bool,
    pub dmarc_ok: bool,
    /// None when the domain publishes no DKIM record
    pub dkim_ok: Option<bool>,
}

impl VerifyReport {
    /// Whether everything the domain should publish is visible
    pub fn all_ok(&self) -> bool {
        self.mx_ok && self.spf_ok && self.dmarc_ok && self.dkim_ok.unwrap_or(true)
    }
}

/// Resolver-backed verification of a domain's mail records
pub struct DnsVerifier {
    resolver: TokioAsyncResolver,
}

impl DnsVerifier {
    /// Create a verifier using the system's default upstream resolvers
    pub fn new() -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
        }
    }

    /// Check the domain's published records against the desired set
    pub async fn verify(&self, domain: &Domain, desired: &DesiredRecords) -> Result<VerifyReport> {
        let mx_ok = self.check_mx(&domain.name).await?;
        let spf_ok = self.check_txt(&domain.name, "spf1").await?;
        let dmarc_ok = self
            .check_txt(&format!("_dmarc.{}", domain.name), "dmarc1")
            .await?;

        let dkim_ok = match &desired.dkim {
            DkimStatus::Published { selector } => Some(
                self.check_txt(&format!("{selector}._domainkey.{}", domain.name), "dkim1")
                    .await?,
            ),
            DkimStatus::NotRequired => None,
        };

        let report = VerifyReport {
            mx_ok,
            spf_ok,
            dmarc_ok,
            dkim_ok,
        };
        debug!(domain = %domain.name, ?report, "DNS verification complete");
        Ok(report)
    }

    async fn check_mx(&self, name: &str) -> Result<bool> {
        match self.resolver.mx_lookup(name).await {
            Ok(lookup) => Ok(lookup.iter().next().is_some()),
            Err(e) if is_no_records(&e) => Ok(false),
            Err(e) => Err(Error::Connectivity(format!("MX lookup for {name}: {e}"))),
        }
    }

    async fn check_txt(&self, name: &str, signature: &str) -> Result<bool> {
        match self.resolver.txt_lookup(name).await {
            Ok(lookup) => Ok(lookup.iter().any(|txt| {
                txt.to_string().to_ascii_lowercase().contains(signature)
            })),
            Err(e) if is_no_records(&e) => Ok(false),
            Err(e) => Err(Error::Connectivity(format!("TXT lookup for {name}: {e}"))),
        }
    }
}

impl Default for DnsVerifier {
    fn default() -> Self {
        Self::new()
    }
}

/// NXDOMAIN and empty answers mean "not published", not a failure
fn is_no_records(e: &trust_dns_resolver::error::ResolveError) -> bool {
    matches!(
        e.kind(),
        trust_dns_resolver::error::ResolveErrorKind::NoRecordsFound { .. }
    )
}
