//! Zone reconciliation against the registrar
//!
//! The registrar write is a destructive full replace, so the invariant
//! here is absolute: never write a zone that was not successfully read
//! first, and preserve every foreign record byte-for-byte. Concurrent
//! reconciliations against the same parent zone are serialized with a
//! per-zone lock so two domains sharing a zone cannot interleave their
//! read-modify-write cycles.

use super::client::{RegistrarClient, ZoneRecord};
use crate::dns::classify::is_managed_record;
use crate::dns::records::{DesiredRecords, DnsRecord};
use mailstead_common::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Reconciliation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Replace every managed record with the desired set,
    /// preserving foreign records verbatim
    ReplaceManaged,
    /// Append desired records that do not already exist; never remove
    /// or rewrite anything. An empty existing zone is refused unless
    /// explicitly allowed, since it usually means a silently failed
    /// read rather than a genuinely empty zone.
    AddMissing { allow_empty_zone: bool },
}

/// What a reconciliation pass did
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileReport {
    pub parent_zone: String,
    /// Foreign records carried through unchanged
    pub preserved_foreign: usize,
    /// Managed records dropped in favor of the desired set
    /// (ReplaceManaged only)
    pub replaced_managed: usize,
    /// Desired records written in this pass
    pub written: usize,
    /// Whether a write was issued at all
    pub wrote: bool,
}

/// Reconciles a domain's desired records into its parent zone
pub struct ZoneReconciler {
    client: Arc<dyn RegistrarClient>,
    zone_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ZoneReconciler {
    pub fn new(client: Arc<dyn RegistrarClient>) -> Self {
        Self {
            client,
            zone_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for_zone(&self, parent_zone: &str) -> Arc<Mutex<()>> {
        let mut locks = self.zone_locks.lock().await;
        locks
            .entry(parent_zone.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run one reconciliation pass for a domain's desired record set
    pub async fn reconcile(
        &self,
        desired: &DesiredRecords,
        mode: ReconcileMode,
    ) -> Result<ReconcileReport> {
        let parent_zone = desired.layout.parent_zone.clone();
        let lock = self.lock_for_zone(&parent_zone).await;
        let _guard = lock.lock().await;

        let existing = self.client.read_zone(&parent_zone).await.map_err(|e| {
            warn!(parent_zone, error = %e, "Zone read failed, refusing to write");
            Error::SafetyAbort(format!("Zone read for {parent_zone} failed: {e}"))
        })?;

        match mode {
            ReconcileMode::ReplaceManaged => {
                self.replace_managed(desired, &parent_zone, existing).await
            }
            ReconcileMode::AddMissing { allow_empty_zone } => {
                self.add_missing(desired, &parent_zone, existing, allow_empty_zone)
                    .await
            }
        }
    }

    async fn replace_managed(
        &self,
        desired: &DesiredRecords,
        parent_zone: &str,
        existing: Vec<ZoneRecord>,
    ) -> Result<ReconcileReport> {
        let total = existing.len();
        let foreign: Vec<ZoneRecord> = existing
            .into_iter()
            .filter(|r| !is_managed_record(&desired.layout, &r.record_type, &r.host, &r.value))
            .collect();
        let replaced_managed = total - foreign.len();

        let mut next = foreign;
        let preserved_foreign = next.len();
        next.extend(desired.records.iter().map(to_zone_record));
        let written = desired.records.len();

        self.client.write_zone(parent_zone, &next).await?;
        info!(
            parent_zone,
            preserved_foreign, replaced_managed, written, "Replaced managed records"
        );

        Ok(ReconcileReport {
            parent_zone: parent_zone.to_string(),
            preserved_foreign,
            replaced_managed,
            written,
            wrote: true,
        })
    }

    async fn add_missing(
        &self,
        desired: &DesiredRecords,
        parent_zone: &str,
        existing: Vec<ZoneRecord>,
        allow_empty_zone: bool,
    ) -> Result<ReconcileReport> {
        if existing.is_empty() && !allow_empty_zone {
            return Err(Error::SafetyAbort(format!(
                "Zone {parent_zone} read back empty; refusing to write without explicit confirmation"
            )));
        }

        let missing: Vec<ZoneRecord> = desired
            .records
            .iter()
            .filter(|d| !existing.iter().any(|e| record_exists(e, d)))
            .map(to_zone_record)
            .collect();

        if missing.is_empty() {
            info!(parent_zone, "All desired records already present");
            return Ok(ReconcileReport {
                parent_zone: parent_zone.to_string(),
                preserved_foreign: existing.len(),
                replaced_managed: 0,
                written: 0,
                wrote: false,
            });
        }

        let preserved = existing.len();
        let written = missing.len();
        let mut next = existing;
        next.extend(missing);

        self.client.write_zone(parent_zone, &next).await?;
        info!(parent_zone, preserved, written, "Appended missing records");

        Ok(ReconcileReport {
            parent_zone: parent_zone.to_string(),
            preserved_foreign: preserved,
            replaced_managed: 0,
            written,
            wrote: true,
        })
    }
}

fn to_zone_record(record: &DnsRecord) -> ZoneRecord {
    ZoneRecord {
        host: record.host.clone(),
        record_type: record.kind.as_str().to_string(),
        value: record.value.clone(),
        ttl: record.ttl,
        mx_pref: record.mx_pref,
    }
}

/// Existence check for add-missing mode: same type and host, and the
/// values match as substrings in either direction
fn record_exists(existing: &ZoneRecord, desired: &DnsRecord) -> bool {
    existing.record_type.eq_ignore_ascii_case(desired.kind.as_str())
        && existing.host == desired.host
        && (existing.value.contains(&desired.value) || desired.value.contains(&existing.value))
}
