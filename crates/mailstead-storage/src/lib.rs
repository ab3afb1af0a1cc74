//! Mailstead Storage - database models and repositories
//!
//! PostgreSQL-backed persistence for domains, DKIM key records, email
//! accounts, folders, and stored messages.

pub mod db;
pub mod models;
pub mod repository;

pub use db::{Database, DatabasePool};
pub use models::*;
pub use repository::*;
