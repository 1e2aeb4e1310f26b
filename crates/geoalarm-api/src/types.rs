//! Shared types for the geoalarm API

use chrono::{DateTime, Local};
use geoalarm_util::{GeoalarmError, Result, ZoneId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A geographic coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Reject NaN/infinite values and out-of-range latitude or longitude
    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(GeoalarmError::invalid(format!(
                "coordinate ({}, {}) is not finite",
                self.latitude, self.longitude
            )));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(GeoalarmError::invalid(format!(
                "latitude {} outside [-90, 90]",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(GeoalarmError::invalid(format!(
                "longitude {} outside [-180, 180]",
                self.longitude
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// What happens to `active` when a zone is entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolicy {
    /// Flag the zone as ringing and leave it active so it can be stopped explicitly
    #[default]
    KeepActive,
    /// Flag the zone as ringing and switch it off in the same step
    Deactivate,
}

/// Derived state of a zone at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneState {
    /// Not monitored
    Off,
    /// Monitored for entry
    Armed,
    /// Active but suppressed until the snooze deadline
    Snoozed,
    /// Entered and not yet acknowledged
    Ringing,
}

impl fmt::Display for ZoneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ZoneState::Off => "off",
            ZoneState::Armed => "armed",
            ZoneState::Snoozed => "snoozed",
            ZoneState::Ringing => "ringing",
        };
        f.write_str(s)
    }
}

fn default_true() -> bool {
    true
}

/// A persisted, user-defined circular geofence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub center: Coordinate,
    pub radius_meters: f64,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub triggered: bool,
    /// Evaluation is suspended while this lies in the future
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snoozed_until: Option<DateTime<Local>>,
}

impl Zone {
    /// Create a new armed zone with a fresh id
    pub fn new(name: impl Into<String>, center: Coordinate, radius_meters: f64) -> Result<Self> {
        let zone = Self {
            id: ZoneId::generate(),
            name: validate_name(name.into())?,
            center,
            radius_meters,
            active: true,
            triggered: false,
            snoozed_until: None,
        };
        zone.validate()?;
        Ok(zone)
    }

    /// Check the geometric invariants (center in range, radius positive)
    pub fn validate(&self) -> Result<()> {
        self.center.validate()?;
        validate_radius(self.radius_meters)
    }

    /// Whether a snooze deadline is still pending at `now`
    pub fn is_snoozed(&self, now: DateTime<Local>) -> bool {
        self.snoozed_until.is_some_and(|until| until > now)
    }

    /// Derive the state machine position from the stored flags
    pub fn state(&self, now: DateTime<Local>) -> ZoneState {
        if self.triggered {
            ZoneState::Ringing
        } else if !self.active {
            ZoneState::Off
        } else if self.is_snoozed(now) {
            ZoneState::Snoozed
        } else {
            ZoneState::Armed
        }
    }

    /// Whether the evaluator should test this zone for entry at `now`
    pub fn is_armed(&self, now: DateTime<Local>) -> bool {
        self.state(now) == ZoneState::Armed
    }

    pub fn rename(&mut self, name: impl Into<String>) -> Result<()> {
        self.name = validate_name(name.into())?;
        Ok(())
    }

    pub fn set_radius(&mut self, radius_meters: f64) -> Result<()> {
        validate_radius(radius_meters)?;
        self.radius_meters = radius_meters;
        Ok(())
    }

    /// Build the replacement zone for a moved pin.
    ///
    /// The center is immutable, so moving yields a new armed zone with a new
    /// id that carries over the name and radius.
    pub fn recreated_at(&self, center: Coordinate) -> Result<Zone> {
        Zone::new(self.name.clone(), center, self.radius_meters)
    }

    /// Mark the zone as entered
    pub fn mark_triggered(&mut self, policy: TriggerPolicy) {
        self.triggered = true;
        if policy == TriggerPolicy::Deactivate {
            self.active = false;
        }
    }

    /// User dismissal: Ringing -> Off
    pub fn stop(&mut self) {
        self.triggered = false;
        self.active = false;
        self.snoozed_until = None;
    }

    /// User snooze: Ringing (or Armed) -> Snoozed
    pub fn snooze(&mut self, until: DateTime<Local>) {
        self.triggered = false;
        self.active = true;
        self.snoozed_until = Some(until);
    }

    /// User toggle. Switching off silences, switching on re-arms.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        self.triggered = false;
        self.snoozed_until = None;
    }

    /// Drop a snooze deadline that has already elapsed
    pub fn clear_expired_snooze(&mut self, now: DateTime<Local>) -> bool {
        match self.snoozed_until {
            Some(until) if until <= now => {
                self.snoozed_until = None;
                true
            }
            _ => false,
        }
    }
}

fn validate_name(name: String) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(GeoalarmError::invalid("zone name cannot be empty"));
    }
    Ok(trimmed.to_string())
}

fn validate_radius(radius_meters: f64) -> Result<()> {
    if !radius_meters.is_finite() || radius_meters <= 0.0 {
        return Err(GeoalarmError::invalid(format!(
            "radius {} must be a positive number of meters",
            radius_meters
        )));
    }
    Ok(())
}

/// A position fix from the position source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters, display only
    #[serde(default)]
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Local>,
}

impl PositionSample {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Local>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            timestamp,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Emitted once per zone per entry episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub zone_id: ZoneId,
    pub name: String,
}

/// View of a zone for list display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneView {
    pub zone_id: ZoneId,
    pub name: String,
    pub center: Coordinate,
    pub radius_meters: f64,
    pub state: ZoneState,
    pub snoozed_until: Option<DateTime<Local>>,
    /// Distance from the last applied position, if any
    pub distance_meters: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn office() -> Zone {
        Zone::new("Office", Coordinate::new(28.6139, 77.2090), 500.0).unwrap()
    }

    #[test]
    fn coordinate_validation() {
        assert!(Coordinate::new(28.6139, 77.2090).validate().is_ok());
        assert!(Coordinate::new(90.0, -180.0).validate().is_ok());
        assert!(Coordinate::new(90.5, 0.0).validate().is_err());
        assert!(Coordinate::new(0.0, 181.0).validate().is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).validate().is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn new_zone_is_armed() {
        let zone = office();
        assert!(zone.active);
        assert!(!zone.triggered);
        assert_eq!(zone.state(Local::now()), ZoneState::Armed);
    }

    #[test]
    fn new_zone_rejects_bad_input() {
        let center = Coordinate::new(28.6139, 77.2090);
        assert!(Zone::new("Office", center, 0.0).is_err());
        assert!(Zone::new("Office", center, -5.0).is_err());
        assert!(Zone::new("   ", center, 100.0).is_err());
        assert!(Zone::new("Office", Coordinate::new(95.0, 0.0), 100.0).is_err());
    }

    #[test]
    fn state_transitions() {
        let now = Local::now();
        let mut zone = office();

        zone.mark_triggered(TriggerPolicy::KeepActive);
        assert_eq!(zone.state(now), ZoneState::Ringing);
        assert!(zone.active);

        zone.snooze(now + Duration::minutes(5));
        assert_eq!(zone.state(now), ZoneState::Snoozed);
        assert_eq!(zone.state(now + Duration::minutes(6)), ZoneState::Armed);

        zone.mark_triggered(TriggerPolicy::KeepActive);
        zone.stop();
        assert_eq!(zone.state(now), ZoneState::Off);

        zone.set_active(true);
        assert_eq!(zone.state(now), ZoneState::Armed);

        zone.set_active(false);
        assert_eq!(zone.state(now), ZoneState::Off);
    }

    #[test]
    fn deactivate_policy_still_rings() {
        let mut zone = office();
        zone.mark_triggered(TriggerPolicy::Deactivate);
        assert!(!zone.active);
        assert_eq!(zone.state(Local::now()), ZoneState::Ringing);
    }

    #[test]
    fn toggle_off_silences_ringing_zone() {
        let mut zone = office();
        zone.mark_triggered(TriggerPolicy::KeepActive);
        zone.set_active(false);
        assert!(!zone.triggered);
        assert_eq!(zone.state(Local::now()), ZoneState::Off);
    }

    #[test]
    fn recreate_gets_new_identity() {
        let zone = office();
        let moved = zone.recreated_at(Coordinate::new(28.62, 77.21)).unwrap();
        assert_ne!(moved.id, zone.id);
        assert_eq!(moved.name, zone.name);
        assert_eq!(moved.radius_meters, zone.radius_meters);
        assert_eq!(moved.center, Coordinate::new(28.62, 77.21));
    }

    #[test]
    fn clear_expired_snooze() {
        let now = Local::now();
        let mut zone = office();
        zone.snooze(now + Duration::minutes(1));
        assert!(!zone.clear_expired_snooze(now));
        assert!(zone.clear_expired_snooze(now + Duration::minutes(2)));
        assert!(zone.snoozed_until.is_none());
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let json = r#"{
            "id": "1700000000000",
            "name": "Station",
            "center": { "latitude": 28.6, "longitude": 77.2 },
            "radius_meters": 200.0
        }"#;

        let zone: Zone = serde_json::from_str(json).unwrap();
        assert!(zone.active);
        assert!(!zone.triggered);
        assert!(zone.snoozed_until.is_none());
    }
}
