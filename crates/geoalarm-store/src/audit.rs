//! Audit event types

use chrono::{DateTime, Local};
use geoalarm_util::ZoneId;
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// Zones imported from config into an empty store
    ZonesSeeded { count: usize },

    ZoneCreated { zone_id: ZoneId, name: String },

    /// Name or radius edited, or the zone recreated at a new center
    ZoneUpdated { zone_id: ZoneId, change: String },

    ZoneDeleted { zone_id: ZoneId },

    /// Position entered the zone
    ZoneTriggered {
        zone_id: ZoneId,
        name: String,
        distance_meters: f64,
    },

    /// User dismissed a ringing zone
    ZoneStopped { zone_id: ZoneId },

    ZoneSnoozed {
        zone_id: ZoneId,
        until: DateTime<Local>,
    },

    ZoneToggled { zone_id: ZoneId, active: bool },

    /// The alert sink could not deliver a trigger
    AlertFailed { zone_id: ZoneId, error: String },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: geoalarm_util::now(),
            event,
        }
    }
}
