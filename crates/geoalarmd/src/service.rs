//! The position loop
//!
//! Wires the position source to the engine and the engine to the alert
//! sink. All store access goes through one engine lock, so samples and
//! user commands never interleave inside a load-evaluate-save cycle.

use anyhow::{Context, Result};
use geoalarm_api::{Event, EventPayload, PositionSample, TriggerEvent};
use geoalarm_core::{CoreEngine, CoreEvent, deliver};
use geoalarm_host_api::{AlertDelivery, AlertSink, PositionEvent, PositionSource};
use geoalarm_util::{GeoalarmError, ZoneId};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

/// How often the service checks the store for zones silenced elsewhere
/// (for example by `geoalarmd zones stop` from another shell).
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(1);

/// Main service state
pub struct Service {
    engine: Arc<Mutex<CoreEngine>>,
    sink: Arc<dyn AlertSink>,
    events: mpsc::UnboundedSender<Event>,
    /// Zones the sink has been told are ringing
    ringing: BTreeSet<ZoneId>,
    exit_on_source_end: bool,
}

impl Service {
    pub fn new(
        engine: CoreEngine,
        sink: Arc<dyn AlertSink>,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            sink,
            events,
            ringing: BTreeSet::new(),
            exit_on_source_end: false,
        }
    }

    /// Stop the loop once the position source closes instead of waiting
    /// for a signal
    pub fn exit_on_source_end(mut self, exit: bool) -> Self {
        self.exit_on_source_end = exit;
        self
    }

    pub fn engine(&self) -> Arc<Mutex<CoreEngine>> {
        self.engine.clone()
    }

    /// Seed configured zones, re-raise zones left ringing by a previous run
    /// and announce the service.
    pub async fn start(&mut self) -> Result<()> {
        let (zone_count, still_ringing) = {
            let engine = self.engine.lock().await;
            engine.service_started();

            let seeds = engine.settings().seed_zones.clone();
            engine
                .seed_zones(&seeds)
                .context("Failed to seed zones from config")?;

            let zones = engine.list_zones(geoalarm_util::now())?;
            let ringing = engine.ringing_zones().unwrap_or_else(|e| {
                warn!(error = %e, "Could not read ringing zones");
                Vec::new()
            });
            (zones.len(), ringing)
        };

        if !still_ringing.is_empty() {
            info!(count = still_ringing.len(), "Re-raising zones left ringing");
            self.raise_existing(still_ringing).await;
        }

        info!(zone_count, "Service running");
        self.emit(EventPayload::Started { zone_count });
        Ok(())
    }

    /// Run until `shutdown` completes (or the source ends, if configured).
    pub async fn run<F>(mut self, source: &dyn PositionSource, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut positions = source
            .subscribe()
            .context("Position source was already subscribed")?;

        tokio::pin!(shutdown);

        let mut reconcile_timer = tokio::time::interval(RECONCILE_INTERVAL);
        reconcile_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut source_open = true;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }

                event = positions.recv(), if source_open => match event {
                    Some(PositionEvent::Sample(sample)) => {
                        self.handle_sample(sample).await;
                    }
                    Some(PositionEvent::Unavailable { reason }) => {
                        warn!(reason = %reason, "Position source unavailable");
                        self.emit(EventPayload::PositionSourceUnavailable { reason });
                    }
                    None => {
                        source_open = false;
                        warn!("Position source ended");
                        self.emit(EventPayload::PositionSourceUnavailable {
                            reason: "position feed ended".into(),
                        });
                        if self.exit_on_source_end {
                            break;
                        }
                    }
                },

                _ = reconcile_timer.tick() => {
                    self.reconcile().await;
                }
            }
        }

        info!("Shutting down geoalarmd");
        self.emit(EventPayload::Shutdown);
        self.engine.lock().await.service_stopped();

        info!("Shutdown complete");
        Ok(())
    }

    /// Evaluate one sample and act on the outcome
    pub async fn handle_sample(&mut self, sample: PositionSample) {
        let now = geoalarm_util::now();

        let result = {
            let mut engine = self.engine.lock().await;
            engine.process_position(sample, now)
        };

        match result {
            Ok(events) => self.dispatch(events).await,
            Err(GeoalarmError::StaleSample) => {
                debug!(timestamp = %sample.timestamp, "Dropped stale position sample");
            }
            Err(e) => {
                warn!(error = %e, "Evaluation cycle abandoned");
            }
        }
    }

    /// Route engine events to the sink and the event stream
    pub async fn dispatch(&mut self, events: Vec<CoreEvent>) {
        if events.is_empty() {
            return;
        }

        let failures = deliver(self.sink.as_ref(), &events).await;
        if !failures.is_empty() {
            self.engine.lock().await.record_alert_failures(&failures);
        }

        for event in events {
            match event {
                CoreEvent::ZoneTriggered {
                    zone_id,
                    name,
                    distance_meters,
                } => {
                    self.ringing.insert(zone_id.clone());
                    self.emit(EventPayload::ZoneTriggered {
                        zone_id,
                        name,
                        distance_meters,
                    });
                }
                CoreEvent::ZoneSilenced { zone_id } => {
                    self.ringing.remove(&zone_id);
                    self.emit(EventPayload::ZoneSilenced { zone_id });
                }
                CoreEvent::ZoneRejected { zone_id, reason } => {
                    self.emit(EventPayload::ZoneRejected { zone_id, reason });
                }
                CoreEvent::SampleSkipped { reason } => {
                    self.emit(EventPayload::SampleSkipped { reason });
                }
                CoreEvent::ZonesChanged { count } => {
                    debug!(count, "Zone collection changed");
                }
            }
        }
    }

    /// Bring the sink in line with the store: zones stopped, snoozed or
    /// deleted by another process are silenced here.
    pub async fn reconcile(&mut self) {
        let stored = match self.engine.lock().await.ringing_zones() {
            Ok(zones) => zones,
            Err(e) => {
                debug!(error = %e, "Skipping reconcile");
                return;
            }
        };

        let stored_ids: BTreeSet<ZoneId> = stored.iter().map(|t| t.zone_id.clone()).collect();
        let silenced: Vec<CoreEvent> = self
            .ringing
            .difference(&stored_ids)
            .map(|zone_id| CoreEvent::ZoneSilenced {
                zone_id: zone_id.clone(),
            })
            .collect();

        if !silenced.is_empty() {
            info!(count = silenced.len(), "Silencing zones dismissed elsewhere");
            self.dispatch(silenced).await;
        }

        let raised: Vec<TriggerEvent> = stored
            .into_iter()
            .filter(|t| !self.ringing.contains(&t.zone_id))
            .collect();
        if !raised.is_empty() {
            self.raise_existing(raised).await;
        }
    }

    async fn raise_existing(&mut self, triggers: Vec<TriggerEvent>) {
        for trigger in triggers {
            if let Err(e) = self.sink.notify(&trigger, AlertDelivery::first()).await {
                warn!(zone_id = %trigger.zone_id, error = %e, "Failed to raise alert");
                let failure = (trigger.zone_id.clone(), GeoalarmError::sink(e.to_string()));
                self.engine
                    .lock()
                    .await
                    .record_alert_failures(std::slice::from_ref(&failure));
            }
            self.ringing.insert(trigger.zone_id);
        }
    }

    fn emit(&self, payload: EventPayload) {
        if self.events.send(Event::new(payload)).is_err() {
            debug!("Event stream closed");
        }
    }
}
