//! Routing engine events to the alert sink

use geoalarm_api::TriggerEvent;
use geoalarm_host_api::{AlertDelivery, AlertSink};
use geoalarm_util::{GeoalarmError, ZoneId};
use tracing::warn;

use crate::CoreEvent;

/// Forward triggers to `notify` and silences to `stop`.
///
/// Sink failures never fail the cycle: the zone stays triggered in the store
/// and the failure is logged and returned so the caller can audit it.
pub async fn deliver(sink: &dyn AlertSink, events: &[CoreEvent]) -> Vec<(ZoneId, GeoalarmError)> {
    let mut failures = Vec::new();

    for event in events {
        let (zone_id, result) = match event {
            CoreEvent::ZoneTriggered { zone_id, name, .. } => {
                let trigger = TriggerEvent {
                    zone_id: zone_id.clone(),
                    name: name.clone(),
                };
                (zone_id, sink.notify(&trigger, AlertDelivery::first()).await)
            }
            CoreEvent::ZoneSilenced { zone_id } => (zone_id, sink.stop(zone_id).await),
            _ => continue,
        };

        if let Err(e) = result {
            let error = GeoalarmError::sink(e.to_string());
            warn!(zone_id = %zone_id, error = %error, "Alert sink failed");
            failures.push((zone_id.clone(), error));
        }
    }

    failures
}
