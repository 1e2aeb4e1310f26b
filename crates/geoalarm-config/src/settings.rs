//! Validated settings structures

use crate::schema::{RawAlarmConfig, RawConfig, RawPositionConfig, RawServiceConfig, RawZone};
use crate::validation::parse_trigger_policy;
use geoalarm_api::{Coordinate, TriggerPolicy};
use std::path::PathBuf;
use std::time::Duration;

/// Default seconds between silent re-assertions
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 5;

/// Default snooze length
pub const DEFAULT_SNOOZE_SECS: u64 = 300;

/// Longest snooze accepted, from config or per request (one week)
pub const MAX_SNOOZE_SECS: u64 = 7 * 24 * 60 * 60;

/// Validated settings ready for use by the core engine
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub service: ServiceConfig,
    pub alarm: AlarmConfig,
    pub position: PositionConfig,
    pub seed_zones: Vec<SeedZone>,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            alarm: AlarmConfig::from_raw(raw.alarm),
            position: PositionConfig::from_raw(raw.position),
            seed_zones: raw.zones.into_iter().map(SeedZone::from_raw).collect(),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            data_dir: raw
                .data_dir
                .unwrap_or_else(geoalarm_util::data_dir_without_env),
        }
    }

    /// Location of the SQLite zone store
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(geoalarm_util::DATABASE_FILENAME)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// Alarm behaviour
#[derive(Debug, Clone)]
pub struct AlarmConfig {
    pub trigger_policy: TriggerPolicy,
    /// Zero disables re-assertion
    pub refresh_interval: Duration,
    pub default_snooze: Duration,
}

impl AlarmConfig {
    fn from_raw(raw: RawAlarmConfig) -> Self {
        Self {
            trigger_policy: raw
                .trigger_policy
                .as_deref()
                .and_then(parse_trigger_policy)
                .unwrap_or_default(),
            refresh_interval: Duration::from_secs(
                raw.refresh_interval_seconds
                    .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),
            ),
            default_snooze: Duration::from_secs(
                raw.default_snooze_seconds.unwrap_or(DEFAULT_SNOOZE_SECS),
            ),
        }
    }
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self::from_raw(RawAlarmConfig::default())
    }
}

/// Position cadence filter. Both zero means every sample is evaluated.
#[derive(Debug, Clone, Default)]
pub struct PositionConfig {
    pub min_interval: Duration,
    pub min_distance_meters: f64,
}

impl PositionConfig {
    fn from_raw(raw: RawPositionConfig) -> Self {
        Self {
            min_interval: Duration::from_millis(raw.min_interval_ms.unwrap_or(0)),
            min_distance_meters: raw.min_distance_meters.unwrap_or(0.0),
        }
    }

    pub fn is_unfiltered(&self) -> bool {
        self.min_interval.is_zero() && self.min_distance_meters <= 0.0
    }
}

/// Zone to import into an empty store
#[derive(Debug, Clone)]
pub struct SeedZone {
    pub name: String,
    pub center: Coordinate,
    pub radius_meters: f64,
    pub active: bool,
}

impl SeedZone {
    fn from_raw(raw: RawZone) -> Self {
        Self {
            name: raw.name.trim().to_string(),
            center: Coordinate::new(raw.latitude, raw.longitude),
            radius_meters: raw.radius_meters,
            active: raw.active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.alarm.trigger_policy, TriggerPolicy::KeepActive);
        assert_eq!(settings.alarm.refresh_interval, Duration::from_secs(5));
        assert_eq!(settings.alarm.default_snooze, Duration::from_secs(300));
        assert!(settings.position.is_unfiltered());
        assert!(settings.seed_zones.is_empty());
        assert!(settings
            .service
            .database_path()
            .ends_with(geoalarm_util::DATABASE_FILENAME));
    }

    #[test]
    fn seed_zone_names_are_trimmed() {
        let seed = SeedZone::from_raw(RawZone {
            name: "  Office ".into(),
            latitude: 28.6139,
            longitude: 77.2090,
            radius_meters: 500.0,
            active: true,
        });
        assert_eq!(seed.name, "Office");
        assert_eq!(seed.center, Coordinate::new(28.6139, 77.2090));
    }
}
