//! Registrar zone access and reconciliation
//!
//! The registrar API exposes whole-zone reads and destructive
//! whole-zone writes only; there is no partial update. The reconciler
//! builds the complete replacement list itself and never writes after
//! a failed read.

pub mod client;
pub mod reconcile;

pub use client::{HttpRegistrarClient, RegistrarClient, ZoneRecord};
pub use reconcile::{ReconcileMode, ReconcileReport, ZoneReconciler};
