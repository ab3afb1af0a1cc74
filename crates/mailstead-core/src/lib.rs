//! Mailstead Core - domain identity provisioning and mailbox pipeline
//!
//! This crate provides the core functionality for Mailstead, including
//! DKIM key generation, DNS record synthesis and reconciliation against
//! the registrar, domain and mailbox provisioning, and the message
//! ingest/dispatch pipeline.

pub mod dkim;
pub mod dns;
pub mod pipeline;
pub mod provision;
pub mod registrar;

pub use dkim::{DkimGenerator, KeygenOutcome};
pub use dns::{DesiredRecords, DkimStatus, DnsRecord, RecordKind, ZoneLayout};
pub use pipeline::{Dispatcher, Ingestor, OutgoingAttachment, OutgoingMessage, SendOutcome, SyncReport};
pub use provision::{DomainProvision, DomainProvisioner, MailboxProvisioner};
pub use registrar::{
    HttpRegistrarClient, ReconcileMode, ReconcileReport, RegistrarClient, ZoneReconciler,
    ZoneRecord,
};
