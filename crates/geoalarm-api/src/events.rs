//! Event types for the daemon's NDJSON output stream

use chrono::{DateTime, Local};
use geoalarm_util::ZoneId;
use serde::{Deserialize, Serialize};

use crate::API_VERSION;

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: geoalarm_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Service finished starting up
    Started { zone_count: usize },

    /// A zone was entered and started ringing
    ZoneTriggered {
        zone_id: ZoneId,
        name: String,
        distance_meters: f64,
    },

    /// A ringing zone was stopped, snoozed, disabled or deleted
    ZoneSilenced { zone_id: ZoneId },

    /// A zone failed validation and was left out of this round
    ZoneRejected { zone_id: ZoneId, reason: String },

    /// A position sample was not evaluated
    SampleSkipped { reason: String },

    /// The position source ended or failed
    PositionSourceUnavailable { reason: String },

    /// Service is shutting down
    Shutdown,
}
