//! Mailstead Common - Shared types and utilities
//!
//! This crate provides common types, configuration, and the error
//! taxonomy shared across all Mailstead components.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::Config;
pub use logging::init_logging;
pub use error::{Error, Result};
