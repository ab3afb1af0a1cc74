//! Synthesized DNS records
//!
//! Records are produced fresh on every call so they always reflect the
//! current domain and DKIM state. Nothing here is cached or persisted.

use mailstead_common::config::MailServerConfig;
use mailstead_storage::models::{DkimKey, Domain};
use serde::{Deserialize, Serialize};

/// Default TTL for synthesized records, in seconds
pub const DEFAULT_TTL: u32 = 1800;

/// MX priority for the mail server host
pub const MX_PRIORITY: u16 = 10;

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    A,
    Mx,
    Txt,
}

impl RecordKind {
    /// Registrar API type string
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::A => "A",
            RecordKind::Mx => "MX",
            RecordKind::Txt => "TXT",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single synthesized record, expressed relative to the parent zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Host name relative to the parent zone ("@" for the zone apex)
    pub host: String,
    pub kind: RecordKind,
    pub value: String,
    pub ttl: u32,
    /// MX priority, None for other record types
    pub mx_pref: Option<u16>,
}

impl DnsRecord {
    fn new(host: impl Into<String>, kind: RecordKind, value: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            kind,
            value: value.into(),
            ttl: DEFAULT_TTL,
            mx_pref: None,
        }
    }

    fn mx(host: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            mx_pref: Some(MX_PRIORITY),
            ..Self::new(host, RecordKind::Mx, value)
        }
    }
}

/// DKIM publication status for a synthesis pass
///
/// A missing or unpublishable key is reported as NotRequired so the
/// reconciler never writes a placeholder DKIM value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DkimStatus {
    /// DKIM TXT is part of the desired set
    Published { selector: String },
    /// No DKIM record should exist for this domain
    NotRequired,
}

/// How a domain maps onto the registrar-managed parent zone
///
/// For `geo.example.com` the parent zone is `example.com` and every
/// host is rewritten under the `geo` label. Derived once per synthesis
/// call and applied uniformly to all record types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneLayout {
    /// The registrable zone the registrar manages (SLD + TLD)
    pub parent_zone: String,
    /// Subdomain labels under the parent zone, empty for the apex
    pub prefix: Option<String>,
}

impl ZoneLayout {
    /// Derive the layout from a fully qualified domain name.
    ///
    /// The registrable zone is taken to be the last two labels, which
    /// holds for single-label public suffixes only. Under a multi-label
    /// suffix (`example.co.uk`) this yields `co.uk` as the parent zone;
    /// the registrar rejects zones it does not manage, so a reconcile
    /// against such a name fails at the read step without writing.
    pub fn for_domain(name: &str) -> Self {
        let labels: Vec<&str> = name.trim_end_matches('.').split('.').collect();
        if labels.len() <= 2 {
            Self {
                parent_zone: labels.join("."),
                prefix: None,
            }
        } else {
            let split = labels.len() - 2;
            Self {
                parent_zone: labels[split..].join("."),
                prefix: Some(labels[..split].join(".")),
            }
        }
    }

    /// Compose a zone-relative host name for this domain
    pub fn compose(&self, host: &str) -> String {
        match &self.prefix {
            None => host.to_string(),
            Some(prefix) if host == "@" => prefix.clone(),
            Some(prefix) => format!("{host}.{prefix}"),
        }
    }

    /// Host for the domain's DKIM TXT record
    pub fn dkim_host(&self, selector: &str) -> String {
        self.compose(&format!("{selector}._domainkey"))
    }

    /// Host for the domain's DMARC TXT record
    pub fn dmarc_host(&self) -> String {
        self.compose("_dmarc")
    }
}

/// The full desired record set for one domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredRecords {
    pub layout: ZoneLayout,
    pub records: Vec<DnsRecord>,
    pub dkim: DkimStatus,
}

/// Synthesize the canonical record set for a domain.
///
/// Always produces MX, SPF TXT, DMARC TXT, and a mail-server A record.
/// DKIM TXT is included only when the key record is enabled with a
/// non-empty public value.
pub fn synthesize(
    server: &MailServerConfig,
    domain: &Domain,
    dkim: Option<&DkimKey>,
) -> DesiredRecords {
    let layout = ZoneLayout::for_domain(&domain.name);

    let mut records = vec![
        DnsRecord::mx(layout.compose("@"), &server.hostname),
        DnsRecord::new(
            layout.compose("@"),
            RecordKind::Txt,
            format!(
                "v=spf1 mx a:{} ip4:{} ~all",
                server.hostname, server.ip
            ),
        ),
        DnsRecord::new(
            layout.dmarc_host(),
            RecordKind::Txt,
            format!(
                "v=DMARC1; p=none; rua=mailto:admin@{d}; ruf=mailto:admin@{d}; fo=1",
                d = domain.name
            ),
        ),
        DnsRecord::new(layout.compose("mail"), RecordKind::A, &server.ip),
    ];

    let dkim_status = match dkim {
        Some(key) if key.is_published() => {
            records.push(DnsRecord::new(
                layout.dkim_host(&key.selector),
                RecordKind::Txt,
                &key.public_key_txt,
            ));
            DkimStatus::Published {
                selector: key.selector.clone(),
            }
        }
        _ => DkimStatus::NotRequired,
    };

    DesiredRecords {
        layout,
        records,
        dkim: dkim_status,
    }
}
