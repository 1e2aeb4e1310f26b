//! Console host adapters
//!
//! - [`ConsoleNotifier`]: alert banners on stderr
//! - [`TerminalBell`]: repeating terminal bell as the alarm sound
//! - [`NdjsonPositionSource`]: position fixes as JSON lines from a file or stdin

use geoalarm_api::{PositionSample, TriggerEvent};
use geoalarm_host_api::{
    AudioBackend, Notifier, PlaybackToken, PositionEvent, PositionSource, SinkError, SinkResult,
};
use geoalarm_util::ZoneId;
use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Visible alerts as banners on stderr
#[derive(Default)]
pub struct ConsoleNotifier {
    visible: Mutex<BTreeSet<ZoneId>>,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for ConsoleNotifier {
    fn raise(&self, event: &TriggerEvent, silent: bool) -> SinkResult<()> {
        let newly_visible = self
            .visible
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event.zone_id.clone());

        if silent && !newly_visible {
            debug!(zone_id = %event.zone_id, "Alert still showing");
            return Ok(());
        }

        let mut stderr = std::io::stderr().lock();
        writeln!(
            stderr,
            "*** ALARM: you have arrived at {} ({}) ***",
            event.name, event.zone_id
        )?;
        Ok(())
    }

    fn withdraw(&self, zone_id: &ZoneId) -> SinkResult<()> {
        let was_visible = self
            .visible
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(zone_id);

        if was_visible {
            info!(zone_id = %zone_id, "Alert withdrawn");
        }
        Ok(())
    }
}

/// Alarm sound: rings the terminal bell on a loop until released
pub struct TerminalBell {
    period: Duration,
    next_id: AtomicU64,
    loops: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl TerminalBell {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_id: AtomicU64::new(1),
            loops: Mutex::new(HashMap::new()),
        }
    }
}

impl AudioBackend for TerminalBell {
    fn acquire(&self) -> SinkResult<PlaybackToken> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SinkError::AudioFailed(format!("no async runtime: {}", e)))?;

        let period = self.period;
        let handle = runtime.spawn(async move {
            let mut timer = tokio::time::interval(period);
            loop {
                timer.tick().await;
                let mut stderr = std::io::stderr().lock();
                if stderr.write_all(b"\x07").and_then(|_| stderr.flush()).is_err() {
                    break;
                }
            }
        });

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.loops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, handle);

        debug!(token = id, "Bell started");
        Ok(PlaybackToken::new(id))
    }

    fn release(&self, token: PlaybackToken) -> SinkResult<()> {
        let handle = self
            .loops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&token.id());

        match handle {
            Some(handle) => {
                handle.abort();
                debug!(token = token.id(), "Bell stopped");
                Ok(())
            }
            None => Err(SinkError::Internal(format!(
                "unknown playback token {}",
                token.id()
            ))),
        }
    }
}

impl Drop for TerminalBell {
    fn drop(&mut self) {
        let loops = self.loops.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in loops.drain() {
            handle.abort();
        }
    }
}

type LineReader = Box<dyn AsyncRead + Send + Unpin>;

/// Position fixes read as newline-delimited JSON [`PositionSample`]s.
///
/// Blank lines are ignored and malformed lines are logged and skipped. End
/// of input closes the channel; a read error is reported as
/// [`PositionEvent::Unavailable`] before closing.
pub struct NdjsonPositionSource {
    reader: Mutex<Option<LineReader>>,
}

impl NdjsonPositionSource {
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            reader: Mutex::new(Some(Box::new(reader))),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(Self::new(tokio::fs::File::from_std(file)))
    }

    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

impl PositionSource for NdjsonPositionSource {
    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<PositionEvent>> {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;

        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            let mut line_no = 0u64;

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        line_no += 1;
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }

                        match serde_json::from_str::<PositionSample>(line) {
                            Ok(sample) => {
                                if tx.send(PositionEvent::Sample(sample)).is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(line = line_no, error = %e, "Ignoring malformed position line");
                            }
                        }
                    }
                    Ok(None) => {
                        debug!(lines = line_no, "Position input finished");
                        break;
                    }
                    Err(e) => {
                        let _ = tx.send(PositionEvent::Unavailable {
                            reason: format!("read failed: {}", e),
                        });
                        break;
                    }
                }
            }
        });

        Some(rx)
    }
}
