//! Mock host adapters for testing

use async_trait::async_trait;
use geoalarm_api::{PositionSample, TriggerEvent};
use geoalarm_util::ZoneId;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::{
    AlertDelivery, AlertSink, AudioBackend, Notifier, PlaybackToken, PositionEvent,
    PositionSource, SinkError, SinkResult,
};

/// Mock alert sink that records every call
#[derive(Default)]
pub struct MockAlertSink {
    notified: Mutex<Vec<(TriggerEvent, AlertDelivery)>>,
    stopped: Mutex<Vec<ZoneId>>,
    fail_notify: AtomicBool,
    fail_stop: AtomicBool,
}

impl MockAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_notify(&self, fail: bool) {
        self.fail_notify.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    pub fn notifications(&self) -> Vec<(TriggerEvent, AlertDelivery)> {
        self.notified.lock().unwrap().clone()
    }

    pub fn stops(&self) -> Vec<ZoneId> {
        self.stopped.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for MockAlertSink {
    async fn notify(&self, event: &TriggerEvent, delivery: AlertDelivery) -> SinkResult<()> {
        if self.fail_notify.load(Ordering::SeqCst) {
            return Err(SinkError::NotificationFailed("Mock notify failure".into()));
        }
        self.notified.lock().unwrap().push((event.clone(), delivery));
        Ok(())
    }

    async fn stop(&self, zone_id: &ZoneId) -> SinkResult<()> {
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(SinkError::AudioFailed("Mock stop failure".into()));
        }
        self.stopped.lock().unwrap().push(zone_id.clone());
        Ok(())
    }
}

/// Mock audio backend counting acquired and released handles
#[derive(Default)]
pub struct MockAudioBackend {
    next_id: AtomicU64,
    acquired: AtomicU64,
    live: Mutex<BTreeSet<u64>>,
    fail_acquire: AtomicBool,
}

impl MockAudioBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_acquire(&self, fail: bool) {
        self.fail_acquire.store(fail, Ordering::SeqCst);
    }

    /// Total successful acquisitions so far
    pub fn acquire_count(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Handles acquired and not yet released
    pub fn live_handles(&self) -> usize {
        self.live.lock().unwrap().len()
    }
}

impl AudioBackend for MockAudioBackend {
    fn acquire(&self) -> SinkResult<PlaybackToken> {
        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err(SinkError::AudioFailed("Mock audio failure".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.acquired.fetch_add(1, Ordering::SeqCst);
        self.live.lock().unwrap().insert(id);
        Ok(PlaybackToken::new(id))
    }

    fn release(&self, token: PlaybackToken) -> SinkResult<()> {
        self.live.lock().unwrap().remove(&token.id());
        Ok(())
    }
}

/// Mock notifier tracking which alerts are on screen
#[derive(Default)]
pub struct MockNotifier {
    visible: Mutex<BTreeSet<ZoneId>>,
    raised: AtomicU64,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible(&self) -> Vec<ZoneId> {
        self.visible.lock().unwrap().iter().cloned().collect()
    }

    pub fn raised_count(&self) -> u64 {
        self.raised.load(Ordering::SeqCst)
    }
}

impl Notifier for MockNotifier {
    fn raise(&self, event: &TriggerEvent, _silent: bool) -> SinkResult<()> {
        self.raised.fetch_add(1, Ordering::SeqCst);
        self.visible.lock().unwrap().insert(event.zone_id.clone());
        Ok(())
    }

    fn withdraw(&self, zone_id: &ZoneId) -> SinkResult<()> {
        self.visible.lock().unwrap().remove(zone_id);
        Ok(())
    }
}

/// Mock position source fed by the test
pub struct MockPositionSource {
    event_tx: mpsc::UnboundedSender<PositionEvent>,
    event_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<PositionEvent>>>>,
}

impl MockPositionSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            event_tx: tx,
            event_rx: Arc::new(Mutex::new(Some(rx))),
        }
    }

    /// Simulate a position fix
    pub fn push(&self, sample: PositionSample) {
        let _ = self.event_tx.send(PositionEvent::Sample(sample));
    }

    /// Simulate location services going away
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.event_tx.send(PositionEvent::Unavailable {
            reason: reason.into(),
        });
    }
}

impl Default for MockPositionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionSource for MockPositionSource {
    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<PositionEvent>> {
        self.event_rx.lock().unwrap().take()
    }
}
