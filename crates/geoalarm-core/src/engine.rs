//! Zone engine

use chrono::{DateTime, Local};
use geoalarm_api::{Coordinate, PositionSample, TriggerEvent, Zone, ZoneView};
use geoalarm_config::{MAX_SNOOZE_SECS, SeedZone, Settings};
use geoalarm_store::{AuditEvent, AuditEventType, ZoneStore};
use geoalarm_util::{GeoalarmError, Result, ZoneId};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::geo::haversine_distance;
use crate::{CoreEvent, Evaluation, GateDecision, SampleGate, evaluate};

/// Result of a single-zone mutation
#[derive(Debug)]
pub struct ZoneChange {
    /// The zone after the change (the removed zone for deletions)
    pub zone: Zone,
    pub events: Vec<CoreEvent>,
}

/// Outcome of one evaluation cycle, taken out of the store transaction
struct Cycle {
    triggers: Vec<TriggerEvent>,
    distances: Vec<(ZoneId, f64)>,
    rejected: Vec<(ZoneId, GeoalarmError)>,
    saved: bool,
    expired: usize,
    count: usize,
}

/// The zone engine.
///
/// Holds no zone state of its own: every operation loads the latest
/// collection from the store, applies one change and saves it back inside
/// a single store transaction, so engines in other processes sharing the
/// same database never overwrite each other's changes.
pub struct CoreEngine {
    settings: Settings,
    store: Arc<dyn ZoneStore>,
    gate: SampleGate,
}

impl CoreEngine {
    pub fn new(settings: Settings, store: Arc<dyn ZoneStore>) -> Self {
        info!(
            trigger_policy = ?settings.alarm.trigger_policy,
            "Core engine initialized"
        );

        let gate = SampleGate::new(&settings.position);
        Self {
            settings,
            store,
            gate,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Last position that went through a full evaluation cycle
    pub fn last_position(&self) -> Option<&PositionSample> {
        self.gate.last_applied()
    }

    pub fn service_started(&self) {
        self.audit(AuditEventType::ServiceStarted);
    }

    pub fn service_stopped(&self) {
        self.audit(AuditEventType::ServiceStopped);
    }

    /// List all zones with their derived state
    pub fn list_zones(&self, now: DateTime<Local>) -> Result<Vec<ZoneView>> {
        let zones = self.store.load_zones()?;
        let here = self.last_position().map(PositionSample::coordinate);

        Ok(zones
            .iter()
            .map(|zone| ZoneView {
                zone_id: zone.id.clone(),
                name: zone.name.clone(),
                center: zone.center,
                radius_meters: zone.radius_meters,
                state: zone.state(now),
                snoozed_until: zone.snoozed_until.filter(|until| *until > now),
                distance_meters: here.map(|p| haversine_distance(p, zone.center)),
            })
            .collect())
    }

    pub fn get_zone(&self, zone_id: &ZoneId) -> Result<Zone> {
        self.store
            .load_zones()?
            .into_iter()
            .find(|z| &z.id == zone_id)
            .ok_or_else(|| GeoalarmError::ZoneNotFound(zone_id.clone()))
    }

    /// Zones that are ringing in the store right now
    pub fn ringing_zones(&self) -> Result<Vec<TriggerEvent>> {
        Ok(self
            .store
            .load_zones()?
            .into_iter()
            .filter(|z| z.triggered)
            .map(|z| TriggerEvent {
                zone_id: z.id,
                name: z.name,
            })
            .collect())
    }

    pub fn create_zone(
        &self,
        name: &str,
        center: Coordinate,
        radius_meters: f64,
    ) -> Result<ZoneChange> {
        let zone = Zone::new(name, center, radius_meters)?;

        let count = self.update(geoalarm_util::now(), |zones| {
            zones.push(zone.clone());
            Ok(zones.len())
        })?;

        info!(zone_id = %zone.id, name = %zone.name, center = %zone.center, "Zone created");
        self.audit(AuditEventType::ZoneCreated {
            zone_id: zone.id.clone(),
            name: zone.name.clone(),
        });

        Ok(ZoneChange {
            zone,
            events: vec![CoreEvent::ZonesChanged { count }],
        })
    }

    pub fn rename_zone(&self, zone_id: &ZoneId, name: &str) -> Result<ZoneChange> {
        let change = self.modify(zone_id, |zone| zone.rename(name))?;

        info!(zone_id = %zone_id, name = %change.zone.name, "Zone renamed");
        self.audit(AuditEventType::ZoneUpdated {
            zone_id: zone_id.clone(),
            change: format!("renamed to {}", change.zone.name),
        });

        Ok(change)
    }

    pub fn resize_zone(&self, zone_id: &ZoneId, radius_meters: f64) -> Result<ZoneChange> {
        let change = self.modify(zone_id, |zone| zone.set_radius(radius_meters))?;

        info!(zone_id = %zone_id, radius_meters, "Zone resized");
        self.audit(AuditEventType::ZoneUpdated {
            zone_id: zone_id.clone(),
            change: format!("radius set to {}m", radius_meters),
        });

        Ok(change)
    }

    /// Replace the zone with a new armed one at `center`.
    ///
    /// The replacement gets a fresh id and takes the old zone's place in
    /// the list.
    pub fn move_zone(&self, zone_id: &ZoneId, center: Coordinate) -> Result<ZoneChange> {
        let (previous, replacement, count) = self.update(geoalarm_util::now(), |zones| {
            let index = position_of(zones, zone_id)?;
            let replacement = zones[index].recreated_at(center)?;
            let previous = std::mem::replace(&mut zones[index], replacement.clone());
            Ok((previous, replacement, zones.len()))
        })?;

        info!(
            old_zone_id = %zone_id,
            zone_id = %replacement.id,
            center = %center,
            "Zone moved"
        );
        self.audit(AuditEventType::ZoneUpdated {
            zone_id: zone_id.clone(),
            change: format!("recreated as {} at {}", replacement.id, center),
        });

        let mut events = Vec::new();
        if previous.triggered {
            events.push(CoreEvent::ZoneSilenced {
                zone_id: previous.id,
            });
        }
        events.push(CoreEvent::ZonesChanged { count });

        Ok(ZoneChange {
            zone: replacement,
            events,
        })
    }

    /// Switch monitoring on or off. Either way the zone stops ringing.
    pub fn set_active(&self, zone_id: &ZoneId, active: bool) -> Result<ZoneChange> {
        let change = self.modify(zone_id, |zone| {
            zone.set_active(active);
            Ok(())
        })?;

        info!(zone_id = %zone_id, active, "Zone toggled");
        self.audit(AuditEventType::ZoneToggled {
            zone_id: zone_id.clone(),
            active,
        });

        Ok(change)
    }

    /// Suppress the zone for `duration` (or the configured default) from `now`
    pub fn snooze_zone(
        &self,
        zone_id: &ZoneId,
        duration: Option<Duration>,
        now: DateTime<Local>,
    ) -> Result<ZoneChange> {
        let duration = duration.unwrap_or(self.settings.alarm.default_snooze);
        if duration.is_zero() {
            return Err(GeoalarmError::invalid("snooze duration must be positive"));
        }
        if duration > Duration::from_secs(MAX_SNOOZE_SECS) {
            return Err(GeoalarmError::invalid(format!(
                "snooze of {} is longer than the maximum of {}",
                geoalarm_util::format_duration(duration),
                geoalarm_util::format_duration(Duration::from_secs(MAX_SNOOZE_SECS))
            )));
        }
        let until = geoalarm_util::checked_deadline(now, duration)
            .ok_or_else(|| GeoalarmError::invalid("snooze deadline is out of range"))?;

        let change = self.modify_at(zone_id, now, |zone| {
            zone.snooze(until);
            Ok(())
        })?;

        info!(zone_id = %zone_id, until = %until, "Zone snoozed");
        self.audit(AuditEventType::ZoneSnoozed {
            zone_id: zone_id.clone(),
            until,
        });

        Ok(change)
    }

    /// Dismiss the zone: it stops ringing and is switched off
    pub fn stop_zone(&self, zone_id: &ZoneId) -> Result<ZoneChange> {
        let change = self.modify(zone_id, |zone| {
            zone.stop();
            Ok(())
        })?;

        info!(zone_id = %zone_id, "Zone stopped");
        self.audit(AuditEventType::ZoneStopped {
            zone_id: zone_id.clone(),
        });

        Ok(change)
    }

    pub fn delete_zone(&self, zone_id: &ZoneId) -> Result<ZoneChange> {
        let (removed, count) = self.update(geoalarm_util::now(), |zones| {
            let index = position_of(zones, zone_id)?;
            let removed = zones.remove(index);
            Ok((removed, zones.len()))
        })?;

        info!(zone_id = %zone_id, name = %removed.name, "Zone deleted");
        self.audit(AuditEventType::ZoneDeleted {
            zone_id: zone_id.clone(),
        });

        let mut events = Vec::new();
        if removed.triggered {
            events.push(CoreEvent::ZoneSilenced {
                zone_id: removed.id.clone(),
            });
        }
        events.push(CoreEvent::ZonesChanged { count });

        Ok(ZoneChange {
            zone: removed,
            events,
        })
    }

    /// Import configured zones. Only an empty store is seeded.
    pub fn seed_zones(&self, seeds: &[SeedZone]) -> Result<Vec<CoreEvent>> {
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        let seeded = seeds
            .iter()
            .map(|seed| {
                let mut zone = Zone::new(seed.name.as_str(), seed.center, seed.radius_meters)?;
                if !seed.active {
                    zone.set_active(false);
                }
                Ok(zone)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut existing = 0;
        let written = self.store.update_zones(&mut |zones| {
            if !zones.is_empty() {
                existing = zones.len();
                return Ok(false);
            }
            zones.extend(seeded.iter().cloned());
            Ok(true)
        })?;

        if !written {
            debug!(existing, "Store already has zones, skipping seed");
            return Ok(Vec::new());
        }

        let count = seeded.len();
        info!(count, "Zones seeded from config");
        self.audit(AuditEventType::ZonesSeeded { count });

        Ok(vec![CoreEvent::ZonesChanged { count }])
    }

    /// Run one evaluation cycle for a position sample.
    ///
    /// Nothing is written unless a zone changed. A store failure abandons
    /// the cycle without recording the sample, so the next sample retries
    /// from a fresh load.
    pub fn process_position(
        &mut self,
        sample: PositionSample,
        now: DateTime<Local>,
    ) -> Result<Vec<CoreEvent>> {
        if let GateDecision::Skip { reason } = self.gate.check(&sample)? {
            debug!(reason = %reason, "Position sample skipped");
            return Ok(vec![CoreEvent::SampleSkipped { reason }]);
        }

        let position = sample.coordinate();
        let policy = self.settings.alarm.trigger_policy;
        let mut cycle = None;

        self.store.update_zones(&mut |zones| {
            let evaluation = evaluate(position, zones.as_slice(), now, policy)?;

            let changed = evaluation.changed();
            let Evaluation {
                zones: evaluated,
                events: triggers,
                distances,
                rejected,
            } = evaluation;

            let mut updated: Vec<Zone> = evaluated.into_iter().map(Cow::into_owned).collect();
            let expired = clear_expired_snoozes(&mut updated, now);
            let saved = changed || expired > 0;
            if saved {
                *zones = updated;
            }

            cycle = Some(Cycle {
                triggers,
                distances,
                rejected,
                saved,
                expired,
                count: zones.len(),
            });
            Ok(saved)
        })?;

        let Cycle {
            triggers,
            distances,
            rejected,
            saved,
            expired,
            count,
        } = cycle.ok_or_else(|| GeoalarmError::internal("evaluation cycle produced no outcome"))?;

        if saved {
            debug!(zone_count = count, expired, "Zones saved after evaluation");
        }

        let mut events = Vec::new();

        for (zone_id, error) in rejected {
            warn!(zone_id = %zone_id, error = %error, "Zone skipped");
            events.push(CoreEvent::ZoneRejected {
                zone_id,
                reason: error.to_string(),
            });
        }

        self.gate.record(sample);

        for trigger in triggers {
            let distance_meters = distances
                .iter()
                .find(|(id, _)| *id == trigger.zone_id)
                .map(|(_, d)| *d)
                .unwrap_or_default();

            info!(
                zone_id = %trigger.zone_id,
                name = %trigger.name,
                distance_meters,
                accuracy = ?sample.accuracy,
                "Zone triggered"
            );
            self.audit(AuditEventType::ZoneTriggered {
                zone_id: trigger.zone_id.clone(),
                name: trigger.name.clone(),
                distance_meters,
            });

            events.push(CoreEvent::ZoneTriggered {
                zone_id: trigger.zone_id,
                name: trigger.name,
                distance_meters,
            });
        }

        if saved {
            events.push(CoreEvent::ZonesChanged { count });
        }

        Ok(events)
    }

    /// Record alert delivery failures in the audit log
    pub fn record_alert_failures(&self, failures: &[(ZoneId, GeoalarmError)]) {
        for (zone_id, error) in failures {
            self.audit(AuditEventType::AlertFailed {
                zone_id: zone_id.clone(),
                error: error.to_string(),
            });
        }
    }

    pub fn recent_audits(&self, limit: usize) -> Result<Vec<AuditEvent>> {
        Ok(self.store.get_recent_audits(limit)?)
    }

    fn modify<F>(&self, zone_id: &ZoneId, f: F) -> Result<ZoneChange>
    where
        F: FnMut(&mut Zone) -> Result<()>,
    {
        self.modify_at(zone_id, geoalarm_util::now(), f)
    }

    fn modify_at<F>(&self, zone_id: &ZoneId, now: DateTime<Local>, mut f: F) -> Result<ZoneChange>
    where
        F: FnMut(&mut Zone) -> Result<()>,
    {
        let (was_ringing, zone, count) = self.update(now, |zones| {
            let index = position_of(zones, zone_id)?;
            let was_ringing = zones[index].triggered;
            f(&mut zones[index])?;
            Ok((was_ringing, zones[index].clone(), zones.len()))
        })?;

        let mut events = Vec::new();
        if was_ringing && !zone.triggered {
            events.push(CoreEvent::ZoneSilenced {
                zone_id: zone.id.clone(),
            });
        }
        events.push(CoreEvent::ZonesChanged { count });

        Ok(ZoneChange { zone, events })
    }

    /// Apply `f` to the stored collection and save it in one store
    /// transaction, dropping snooze deadlines that have passed
    fn update<T, F>(&self, now: DateTime<Local>, mut f: F) -> Result<T>
    where
        F: FnMut(&mut Vec<Zone>) -> Result<T>,
    {
        let mut output = None;
        self.store.update_zones(&mut |zones| {
            output = Some(f(zones)?);
            clear_expired_snoozes(zones, now);
            Ok(true)
        })?;

        output.ok_or_else(|| GeoalarmError::internal("zone update produced no result"))
    }

    fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.store.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to write audit event");
        }
    }
}

fn position_of(zones: &[Zone], zone_id: &ZoneId) -> Result<usize> {
    zones
        .iter()
        .position(|z| &z.id == zone_id)
        .ok_or_else(|| GeoalarmError::ZoneNotFound(zone_id.clone()))
}

fn clear_expired_snoozes(zones: &mut [Zone], now: DateTime<Local>) -> usize {
    zones
        .iter_mut()
        .map(|z| z.clear_expired_snooze(now))
        .filter(|cleared| *cleared)
        .count()
}
