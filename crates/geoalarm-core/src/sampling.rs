//! Position sample gating

use geoalarm_api::PositionSample;
use geoalarm_config::PositionConfig;
use geoalarm_util::{GeoalarmError, Result};
use std::time::Duration;

use crate::geo::haversine_distance;

/// Whether a sample should be evaluated
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Accept,
    Skip { reason: String },
}

/// Filters the position feed down to samples worth evaluating.
///
/// Samples timestamped before the last applied one are stale and refused.
/// When a cadence is configured, a sample passes if it is either old enough
/// or far enough from the last applied sample.
#[derive(Debug, Clone)]
pub struct SampleGate {
    min_interval: Duration,
    min_distance_meters: f64,
    last: Option<PositionSample>,
}

impl SampleGate {
    pub fn new(config: &PositionConfig) -> Self {
        Self {
            min_interval: config.min_interval,
            min_distance_meters: config.min_distance_meters,
            last: None,
        }
    }

    /// Last sample that made it through a full cycle
    pub fn last_applied(&self) -> Option<&PositionSample> {
        self.last.as_ref()
    }

    pub fn check(&self, sample: &PositionSample) -> Result<GateDecision> {
        let Some(last) = &self.last else {
            return Ok(GateDecision::Accept);
        };

        if sample.timestamp < last.timestamp {
            return Err(GeoalarmError::StaleSample);
        }

        if self.min_interval.is_zero() && self.min_distance_meters <= 0.0 {
            return Ok(GateDecision::Accept);
        }

        let elapsed = (sample.timestamp - last.timestamp)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if !self.min_interval.is_zero() && elapsed >= self.min_interval {
            return Ok(GateDecision::Accept);
        }

        let moved = haversine_distance(last.coordinate(), sample.coordinate());
        if self.min_distance_meters > 0.0 && moved >= self.min_distance_meters {
            return Ok(GateDecision::Accept);
        }

        Ok(GateDecision::Skip {
            reason: format!(
                "moved {:.1}m in {}ms since last applied sample",
                moved,
                elapsed.as_millis()
            ),
        })
    }

    /// Remember `sample` as applied
    pub fn record(&mut self, sample: PositionSample) {
        self.last = Some(sample);
    }
}
