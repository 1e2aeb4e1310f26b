//! Store trait definitions

use geoalarm_api::Zone;
use geoalarm_util::Result;

use crate::{AuditEvent, StoreResult};

/// Authoritative owner of the zone collection.
///
/// Load and save are coarse-grained: the whole collection is read or
/// replaced at once, never individual records. Read-modify-write cycles go
/// through [`update_zones`](Self::update_zones), which holds the store's
/// write lock across the load and the save so that other processes sharing
/// the store cannot interleave.
pub trait ZoneStore: Send + Sync {
    // Zone collection

    /// Load every zone, in insertion order
    fn load_zones(&self) -> StoreResult<Vec<Zone>>;

    /// Replace the whole collection
    fn save_zones(&self, zones: &[Zone]) -> StoreResult<()>;

    /// Load the collection, let `f` edit it and save it, atomically.
    ///
    /// `f` returns whether the edited collection should be written. An
    /// error from `f` discards the edit. Returns whether a write happened.
    fn update_zones(&self, f: &mut dyn FnMut(&mut Vec<Zone>) -> Result<bool>) -> Result<bool>;

    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
