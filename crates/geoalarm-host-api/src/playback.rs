//! Scoped alarm playback
//!
//! One looping alarm sound is shared by every ringing zone. The handle is
//! acquired when the first zone starts ringing and released when the last
//! one is silenced, so at most one playback is ever live.

use geoalarm_util::ZoneId;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use crate::SinkResult;

/// Handle to one acquired looping playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackToken(u64);

impl PlaybackToken {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Audio output capable of looping the alarm sound
pub trait AudioBackend: Send + Sync {
    /// Start looping the alarm
    fn acquire(&self) -> SinkResult<PlaybackToken>;

    /// Stop the playback identified by `token`
    fn release(&self, token: PlaybackToken) -> SinkResult<()>;
}

#[derive(Debug, Default)]
struct PlaybackState {
    token: Option<PlaybackToken>,
    ringing: BTreeSet<ZoneId>,
}

/// Owns the single playback handle on behalf of all ringing zones
pub struct AlarmPlayback {
    backend: Arc<dyn AudioBackend>,
    state: Mutex<PlaybackState>,
}

impl AlarmPlayback {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            backend,
            state: Mutex::new(PlaybackState::default()),
        }
    }

    /// Register `zone_id` as ringing, starting audio if it is not playing yet.
    ///
    /// The zone stays registered even if the backend fails, so the next
    /// ring retries the acquisition and a later silence still balances.
    pub fn ring(&self, zone_id: &ZoneId) -> SinkResult<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.ringing.insert(zone_id.clone());

        if state.token.is_none() {
            let token = self.backend.acquire()?;
            debug!(zone_id = %zone_id, token = token.id(), "Alarm playback acquired");
            state.token = Some(token);
        }

        Ok(())
    }

    /// Unregister `zone_id`, releasing audio once nothing else rings
    pub fn silence(&self, zone_id: &ZoneId) -> SinkResult<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.ringing.remove(zone_id);

        if state.ringing.is_empty()
            && let Some(token) = state.token.take()
        {
            debug!(zone_id = %zone_id, token = token.id(), "Alarm playback released");
            self.backend.release(token)?;
        }

        Ok(())
    }

    /// Silence everything (shutdown path)
    pub fn silence_all(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.ringing.clear();

        if let Some(token) = state.token.take()
            && let Err(e) = self.backend.release(token)
        {
            warn!(error = %e, "Failed to release alarm playback");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .is_some()
    }

    pub fn ringing_zones(&self) -> Vec<ZoneId> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ringing
            .iter()
            .cloned()
            .collect()
    }
}

impl Drop for AlarmPlayback {
    fn drop(&mut self) {
        self.silence_all();
    }
}
