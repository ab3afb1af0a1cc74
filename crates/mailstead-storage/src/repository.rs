//! Repository layer for data access

pub mod accounts;
pub mod dkim_keys;
pub mod domains;
pub mod folders;
pub mod messages;
pub mod organizations;

// Re-export concrete repository implementations with simple names
pub use accounts::DbAccountRepository;
pub use dkim_keys::DbDkimKeyRepository;
pub use domains::DbDomainRepository;
pub use folders::DbFolderRepository;
pub use messages::DbMessageRepository;
pub use organizations::DbOrganizationRepository;

// Re-export repository traits
pub use accounts::AccountRepository;
pub use dkim_keys::DkimKeyRepository;
pub use domains::DomainRepository;
pub use folders::FolderRepository;
pub use messages::MessageRepository;
pub use organizations::OrganizationRepository;
