//! DNS record synthesis for mail domains
//!
//! Produces the canonical record set (MX, SPF, DKIM, DMARC, mail-server A)
//! a domain requires, and classifies existing zone records as managed or
//! foreign for the reconciler.

pub mod classify;
pub mod records;
pub mod verify;

pub use classify::is_managed_record;
pub use records::{synthesize, DesiredRecords, DkimStatus, DnsRecord, RecordKind, ZoneLayout};
pub use verify::{DnsVerifier, VerifyReport};
