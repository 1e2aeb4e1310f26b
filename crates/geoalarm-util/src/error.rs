//! Error types for geoalarm

use thiserror::Error;

use crate::ZoneId;

/// Core error type for geoalarm operations
#[derive(Debug, Error)]
pub enum GeoalarmError {
    /// Malformed coordinate or non-positive radius
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Zone store could not be read or written
    #[error("Zone store unavailable: {0}")]
    StoreUnavailable(String),

    /// Alert sink failed to play sound or raise a notification
    #[error("Alert sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("Zone not found: {0}")]
    ZoneNotFound(ZoneId),

    /// Position sample older than the last applied one
    #[error("Stale position sample")]
    StaleSample,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GeoalarmError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::SinkUnavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, GeoalarmError>;
