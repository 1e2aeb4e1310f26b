//! Configuration validation

use crate::schema::{RawConfig, RawZone};
use crate::settings::MAX_SNOOZE_SECS;
use geoalarm_api::{Coordinate, TriggerPolicy};
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Zone '{zone}': {message}")]
    ZoneError { zone: String, message: String },

    #[error("Duplicate zone name: {0}")]
    DuplicateZoneName(String),

    #[error("Unknown trigger policy '{0}' (expected \"keep_active\" or \"deactivate\")")]
    InvalidTriggerPolicy(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(policy) = &config.alarm.trigger_policy
        && parse_trigger_policy(policy).is_none()
    {
        errors.push(ValidationError::InvalidTriggerPolicy(policy.clone()));
    }

    match config.alarm.default_snooze_seconds {
        Some(0) => errors.push(ValidationError::InvalidValue {
            field: "alarm.default_snooze_seconds".into(),
            message: "must be greater than zero".into(),
        }),
        Some(secs) if secs > MAX_SNOOZE_SECS => errors.push(ValidationError::InvalidValue {
            field: "alarm.default_snooze_seconds".into(),
            message: format!("{} exceeds the maximum of {}", secs, MAX_SNOOZE_SECS),
        }),
        _ => {}
    }

    if let Some(distance) = config.position.min_distance_meters
        && (!distance.is_finite() || distance < 0.0)
    {
        errors.push(ValidationError::InvalidValue {
            field: "position.min_distance_meters".into(),
            message: format!("{} must be a non-negative number", distance),
        });
    }

    // Names are the only handle a user has on seed zones
    let mut seen_names = HashSet::new();
    for zone in &config.zones {
        if !seen_names.insert(zone.name.trim().to_lowercase()) {
            errors.push(ValidationError::DuplicateZoneName(zone.name.clone()));
        }
    }

    for zone in &config.zones {
        errors.extend(validate_zone(zone));
    }

    errors
}

fn validate_zone(zone: &RawZone) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let label = if zone.name.trim().is_empty() {
        "<unnamed>".to_string()
    } else {
        zone.name.clone()
    };

    if zone.name.trim().is_empty() {
        errors.push(ValidationError::ZoneError {
            zone: label.clone(),
            message: "name cannot be empty".into(),
        });
    }

    if let Err(e) = Coordinate::new(zone.latitude, zone.longitude).validate() {
        errors.push(ValidationError::ZoneError {
            zone: label.clone(),
            message: e.to_string(),
        });
    }

    if !zone.radius_meters.is_finite() || zone.radius_meters <= 0.0 {
        errors.push(ValidationError::ZoneError {
            zone: label,
            message: format!("radius_meters {} must be positive", zone.radius_meters),
        });
    }

    errors
}

/// Parse a trigger policy name
pub fn parse_trigger_policy(s: &str) -> Option<TriggerPolicy> {
    match s.trim().to_lowercase().as_str() {
        "keep_active" | "keep-active" => Some(TriggerPolicy::KeepActive),
        "deactivate" => Some(TriggerPolicy::Deactivate),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(name: &str, lat: f64, lng: f64, radius: f64) -> RawZone {
        RawZone {
            name: name.into(),
            latitude: lat,
            longitude: lng,
            radius_meters: radius,
            active: true,
        }
    }

    fn config_with(zones: Vec<RawZone>) -> RawConfig {
        RawConfig {
            config_version: 1,
            service: Default::default(),
            alarm: Default::default(),
            position: Default::default(),
            zones,
        }
    }

    #[test]
    fn test_parse_trigger_policy() {
        assert_eq!(parse_trigger_policy("keep_active"), Some(TriggerPolicy::KeepActive));
        assert_eq!(parse_trigger_policy("Deactivate"), Some(TriggerPolicy::Deactivate));
        assert_eq!(parse_trigger_policy("explode"), None);
    }

    #[test]
    fn test_valid_config_has_no_errors() {
        let config = config_with(vec![zone("Office", 28.6139, 77.2090, 500.0)]);
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn test_duplicate_name_detection() {
        let config = config_with(vec![
            zone("Office", 28.6139, 77.2090, 500.0),
            zone("office ", 28.6200, 77.2100, 300.0),
        ]);

        let errors = validate_config(&config);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateZoneName(_))));
    }

    #[test]
    fn test_bad_zone_geometry() {
        let config = config_with(vec![
            zone("North", 91.0, 0.0, 100.0),
            zone("Flat", 10.0, 10.0, 0.0),
            zone("", 10.0, 10.0, 10.0),
        ]);

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 3);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ValidationError::ZoneError { .. })));
    }

    #[test]
    fn test_alarm_and_position_values() {
        let mut config = config_with(vec![]);
        config.alarm.trigger_policy = Some("sometimes".into());
        config.alarm.default_snooze_seconds = Some(0);
        config.position.min_distance_meters = Some(-1.0);

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 3);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidTriggerPolicy(_))));
    }

    #[test]
    fn test_snooze_upper_bound() {
        let mut config = config_with(vec![]);
        config.alarm.default_snooze_seconds = Some(MAX_SNOOZE_SECS);
        assert!(validate_config(&config).is_empty());

        config.alarm.default_snooze_seconds = Some(u64::MAX);
        let errors = validate_config(&config);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ValidationError::InvalidValue { field, .. } if field == "alarm.default_snooze_seconds"
        ));
    }
}
