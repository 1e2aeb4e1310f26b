//! Host adapter traits

use async_trait::async_trait;
use geoalarm_api::{PositionSample, TriggerEvent};
use geoalarm_util::ZoneId;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from alert sink operations
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Audio playback failed: {0}")]
    AudioFailed(String),

    #[error("Notification failed: {0}")]
    NotificationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type SinkResult<T> = Result<T, SinkError>;

/// How an alert is being delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlertDelivery {
    /// Re-assertion of an alert the user has already been told about.
    /// Silent deliveries must not restart audio.
    pub silent: bool,
}

impl AlertDelivery {
    pub fn first() -> Self {
        Self { silent: false }
    }

    pub fn reassert() -> Self {
        Self { silent: true }
    }
}

/// Alert sink - implemented by platform-specific adapters
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Start (or re-assert) the alarm for a zone
    async fn notify(&self, event: &TriggerEvent, delivery: AlertDelivery) -> SinkResult<()>;

    /// Withdraw the alert for a zone, silencing audio if nothing else rings
    async fn stop(&self, zone_id: &ZoneId) -> SinkResult<()>;

    /// Optional: check if the sink is healthy
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Events from a position source
#[derive(Debug, Clone)]
pub enum PositionEvent {
    /// A new position fix
    Sample(PositionSample),

    /// The source stopped delivering (disabled location services, EOF, ...)
    Unavailable { reason: String },
}

/// Position source trait
pub trait PositionSource: Send + Sync {
    /// Take the event receiver. Returns `None` if it was already taken.
    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<PositionEvent>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_flags() {
        assert!(!AlertDelivery::first().silent);
        assert!(AlertDelivery::reassert().silent);
        assert_eq!(AlertDelivery::default(), AlertDelivery::first());
    }
}
