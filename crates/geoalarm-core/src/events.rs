//! Core events emitted by the engine

use geoalarm_util::ZoneId;

/// Events emitted by the core engine.
///
/// The engine never talks to the alert sink itself; callers route these
/// through [`crate::deliver`] and onto the event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// An armed zone was entered
    ZoneTriggered {
        zone_id: ZoneId,
        name: String,
        distance_meters: f64,
    },

    /// A ringing zone was stopped, snoozed, switched off or deleted
    ZoneSilenced { zone_id: ZoneId },

    /// A zone was skipped because its stored geometry is malformed
    ZoneRejected { zone_id: ZoneId, reason: String },

    /// The sample was filtered out by the cadence gate
    SampleSkipped { reason: String },

    /// The zone collection was written
    ZonesChanged { count: usize },
}
