//! Periodic re-assertion of ringing alerts
//!
//! Sticky notifications can still be swiped away on some hosts. The
//! refresher keeps the set of ringing zones and re-delivers each of them
//! silently on a fixed interval until the zone is stopped.

use geoalarm_api::TriggerEvent;
use geoalarm_util::ZoneId;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::{AlertDelivery, AlertSink};

/// Set of alerts to re-assert, keyed by zone
pub struct AlertRefresher {
    interval: Duration,
    active: Mutex<BTreeMap<ZoneId, TriggerEvent>>,
}

impl AlertRefresher {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            active: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Insert or replace the alert for `event.zone_id`
    pub fn upsert(&self, event: TriggerEvent) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event.zone_id.clone(), event);
    }

    /// Stop re-asserting the alert for `zone_id`
    pub fn remove(&self, zone_id: &ZoneId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(zone_id)
            .is_some()
    }

    /// Run `f` on the alert for `zone_id` if it is still registered.
    ///
    /// The registry stays locked while `f` runs, so a concurrent
    /// [`remove`](Self::remove) lands either before (and `f` is skipped) or
    /// after it.
    pub fn with_active<T>(
        &self,
        zone_id: &ZoneId,
        f: impl FnOnce(&TriggerEvent) -> T,
    ) -> Option<T> {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active.get(zone_id).map(f)
    }

    pub fn active(&self) -> Vec<TriggerEvent> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Re-deliver every active alert once. Returns how many succeeded.
    pub async fn refresh_once(&self, sink: &dyn AlertSink) -> usize {
        let mut delivered = 0;

        for event in self.active() {
            match sink.notify(&event, AlertDelivery::reassert()).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    zone_id = %event.zone_id,
                    error = %e,
                    "Failed to re-assert alert"
                ),
            }
        }

        delivered
    }

    /// Run the refresh loop on the current tokio runtime.
    ///
    /// Returns `None` when the interval is zero (re-assertion disabled).
    pub fn spawn(self: Arc<Self>, sink: Arc<dyn AlertSink>) -> Option<JoinHandle<()>> {
        if self.interval.is_zero() {
            debug!("Alert re-assertion disabled");
            return None;
        }

        Some(tokio::spawn(async move {
            let mut timer = tokio::time::interval(self.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; first delivery already happened.
            timer.tick().await;

            loop {
                timer.tick().await;
                let delivered = self.refresh_once(sink.as_ref()).await;
                if delivered > 0 {
                    debug!(delivered, "Alerts re-asserted");
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockAlertSink;

    fn event(id: &str) -> TriggerEvent {
        TriggerEvent {
            zone_id: ZoneId::new(id),
            name: format!("Zone {}", id),
        }
    }

    #[test]
    fn upsert_is_idempotent() {
        let refresher = AlertRefresher::new(Duration::from_secs(5));
        refresher.upsert(event("a"));
        refresher.upsert(event("a"));
        refresher.upsert(event("b"));

        assert_eq!(refresher.active().len(), 2);
        assert!(refresher.remove(&ZoneId::new("a")));
        assert!(!refresher.remove(&ZoneId::new("a")));
        assert_eq!(refresher.active().len(), 1);
    }

    #[test]
    fn with_active_skips_removed_alerts() {
        let refresher = AlertRefresher::new(Duration::from_secs(5));
        refresher.upsert(event("a"));

        assert_eq!(
            refresher.with_active(&ZoneId::new("a"), |e| e.name.clone()),
            Some("Zone a".to_string())
        );

        refresher.remove(&ZoneId::new("a"));
        assert!(refresher.with_active(&ZoneId::new("a"), |_| ()).is_none());
    }

    #[tokio::test]
    async fn refresh_once_is_silent() {
        let refresher = AlertRefresher::new(Duration::from_secs(5));
        let sink = MockAlertSink::new();
        refresher.upsert(event("a"));

        assert_eq!(refresher.refresh_once(&sink).await, 1);

        let notified = sink.notifications();
        assert_eq!(notified.len(), 1);
        assert!(notified[0].1.silent);
    }

    #[tokio::test]
    async fn refresh_once_counts_failures() {
        let refresher = AlertRefresher::new(Duration::from_secs(5));
        let sink = MockAlertSink::new();
        sink.set_fail_notify(true);
        refresher.upsert(event("a"));

        assert_eq!(refresher.refresh_once(&sink).await, 0);
    }

    #[tokio::test]
    async fn zero_interval_disables_task() {
        let refresher = Arc::new(AlertRefresher::new(Duration::ZERO));
        let sink: Arc<dyn AlertSink> = Arc::new(MockAlertSink::new());
        assert!(refresher.spawn(sink).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_task_reasserts_on_interval() {
        let refresher = Arc::new(AlertRefresher::new(Duration::from_secs(5)));
        let sink = Arc::new(MockAlertSink::new());
        refresher.upsert(event("a"));

        let handle = refresher
            .clone()
            .spawn(sink.clone() as Arc<dyn AlertSink>)
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(sink.notifications().len(), 1);

        refresher.remove(&ZoneId::new("a"));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.notifications().len(), 1);

        handle.abort();
    }
}
