//! Domain and mailbox provisioning
//!
//! Provisioning is a sequence of independently retryable steps against
//! the local database, the transfer agent's tables, and the mailbox
//! server's storage tree. A failed step never rolls back prior steps;
//! re-running the operation completes the remainder.

pub mod domain;
pub mod mailbox;
pub mod system;

pub use domain::{DomainProvision, DomainProvisioner, ProvisionStep, StepReport};
pub use mailbox::MailboxProvisioner;
pub use system::{FsMaildirStore, MaildirStore, PostfixTables, TransferAgent};
