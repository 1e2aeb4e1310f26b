//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Alarm behaviour
    #[serde(default)]
    pub alarm: RawAlarmConfig,

    /// Position sample cadence
    #[serde(default)]
    pub position: RawPositionConfig,

    /// Zones imported into an empty store on first run
    #[serde(default)]
    pub zones: Vec<RawZone>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the zone store
    pub data_dir: Option<PathBuf>,
}

/// Alarm settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawAlarmConfig {
    /// "keep_active" or "deactivate"
    pub trigger_policy: Option<String>,

    /// Seconds between silent re-assertions of a ringing alert (0 disables)
    pub refresh_interval_seconds: Option<u64>,

    /// Snooze length used when none is given explicitly
    pub default_snooze_seconds: Option<u64>,
}

/// Position cadence filter
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawPositionConfig {
    /// Minimum time between evaluated samples
    pub min_interval_ms: Option<u64>,

    /// Minimum movement between evaluated samples
    pub min_distance_meters: Option<f64>,
}

/// Seed zone definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawZone {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}
