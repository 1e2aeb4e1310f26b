//! Alarm sink composed from a notifier and an audio backend

use async_trait::async_trait;
use geoalarm_api::TriggerEvent;
use geoalarm_util::ZoneId;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{AlarmPlayback, AlertDelivery, AlertRefresher, AlertSink, AudioBackend, SinkResult};

/// Visible alert surface (desktop notification, terminal banner, ...)
pub trait Notifier: Send + Sync {
    /// Raise or replace the sticky alert for `event.zone_id`
    fn raise(&self, event: &TriggerEvent, silent: bool) -> SinkResult<()>;

    /// Withdraw the alert for `zone_id`
    fn withdraw(&self, zone_id: &ZoneId) -> SinkResult<()>;
}

/// Alert sink that loops one alarm sound for all ringing zones, raises a
/// sticky alert per zone and keeps the alert registered for re-assertion.
pub struct AlarmSink {
    notifier: Arc<dyn Notifier>,
    playback: AlarmPlayback,
    refresher: Arc<AlertRefresher>,
}

impl AlarmSink {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        audio: Arc<dyn AudioBackend>,
        refresher: Arc<AlertRefresher>,
    ) -> Self {
        Self {
            notifier,
            playback: AlarmPlayback::new(audio),
            refresher,
        }
    }

    pub fn refresher(&self) -> &Arc<AlertRefresher> {
        &self.refresher
    }

    pub fn playback(&self) -> &AlarmPlayback {
        &self.playback
    }

    /// Silence every alert (shutdown path)
    pub fn silence_all(&self) {
        for event in self.refresher.active() {
            self.refresher.remove(&event.zone_id);
            if let Err(e) = self.notifier.withdraw(&event.zone_id) {
                warn!(zone_id = %event.zone_id, error = %e, "Failed to withdraw alert");
            }
        }
        self.playback.silence_all();
    }
}

#[async_trait]
impl AlertSink for AlarmSink {
    async fn notify(&self, event: &TriggerEvent, delivery: AlertDelivery) -> SinkResult<()> {
        if delivery.silent {
            // A stop may have landed after the refresher took its snapshot
            let reasserted = self
                .refresher
                .with_active(&event.zone_id, |_| self.notifier.raise(event, true));

            return match reasserted {
                Some(result) => {
                    debug!(zone_id = %event.zone_id, "Re-asserted alert");
                    result
                }
                None => {
                    debug!(zone_id = %event.zone_id, "Alert already stopped, not re-asserting");
                    Ok(())
                }
            };
        }

        info!(zone_id = %event.zone_id, name = %event.name, "Raising alarm");

        // Register first: even if audio fails the alert keeps coming back.
        self.refresher.upsert(event.clone());

        let audio = self.playback.ring(&event.zone_id);
        let visible = self.notifier.raise(event, false);

        audio.and(visible)
    }

    async fn stop(&self, zone_id: &ZoneId) -> SinkResult<()> {
        info!(zone_id = %zone_id, "Silencing alarm");

        self.refresher.remove(zone_id);
        let audio = self.playback.silence(zone_id);
        let visible = self.notifier.withdraw(zone_id);

        audio.and(visible)
    }
}
