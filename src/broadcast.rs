/// Live fan-out of classified readings to connected subscribers.
///
/// ## Delivery model
///
/// - **Best effort, at most once.** No acknowledgements, no persistence, no
///   replay. A subscriber that connects after an event misses it and must
///   resynchronize through the `stations-with-status` snapshot.
/// - **Never blocks the publisher.** Each subscriber owns a bounded queue.
///   A full queue drops the event for that subscriber only (it lags); a
///   subscriber whose receiving end is gone is pruned.
/// - **No events from before the connection.** A subscriber never receives
///   an event timestamped earlier than its own connection time.
///
/// The broadcaster is an explicit service: it accepts subscribers only
/// between `start()` and `stop()`, and `stop()` disconnects everyone.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::clock::Clock;
use crate::model::ReadingEvent;

/// Default per-subscriber queue depth.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BroadcastError {
    #[error("broadcaster is not running")]
    Stopped,
}

/// Outcome of a single `publish` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers the event was queued for.
    pub delivered: usize,
    /// Subscribers whose queue was full; they miss this event.
    pub lagged: usize,
    /// Subscribers found disconnected and removed.
    pub pruned: usize,
    /// Subscribers that connected after the event's timestamp.
    pub skipped: usize,
}

struct Subscriber {
    id: u64,
    connected_at: DateTime<Utc>,
    tx: SyncSender<ReadingEvent>,
}

#[derive(Default)]
struct State {
    running: bool,
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

pub struct Broadcaster {
    state: Mutex<State>,
    buffer: usize,
    clock: Arc<dyn Clock>,
}

impl Broadcaster {
    /// Creates a stopped broadcaster; call `start()` before subscribing.
    pub fn new(buffer: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            buffer: buffer.max(1),
            clock,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // Subscriber bookkeeping stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn start(&self) {
        self.state().running = true;
    }

    /// Stops accepting subscribers and disconnects every current one.
    pub fn stop(&self) {
        let mut state = self.state();
        state.running = false;
        let dropped = state.subscribers.len();
        state.subscribers.clear();
        debug!(dropped, "broadcaster stopped");
    }

    pub fn is_running(&self) -> bool {
        self.state().running
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }

    /// Registers a new subscriber. It receives only events published from
    /// now on whose timestamp is not earlier than this call.
    pub fn subscribe(&self) -> Result<Subscription, BroadcastError> {
        let mut state = self.state();
        if !state.running {
            return Err(BroadcastError::Stopped);
        }

        let (tx, rx) = mpsc::sync_channel(self.buffer);
        let id = state.next_id;
        state.next_id += 1;
        let connected_at = self.clock.now();
        state.subscribers.push(Subscriber { id, connected_at, tx });
        debug!(subscriber = id, total = state.subscribers.len(), "subscriber connected");

        Ok(Subscription { id, connected_at, rx })
    }

    /// Queues `event` for every eligible subscriber without blocking.
    pub fn publish(&self, event: &ReadingEvent) -> PublishReport {
        let mut report = PublishReport::default();
        let mut state = self.state();
        if !state.running {
            return report;
        }

        state.subscribers.retain(|sub| {
            if event.timestamp < sub.connected_at {
                report.skipped += 1;
                return true;
            }
            match sub.tx.try_send(event.clone()) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    debug!(subscriber = sub.id, "subscriber lagging, event dropped");
                    report.lagged += 1;
                    true
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!(subscriber = sub.id, "subscriber disconnected, pruned");
                    report.pruned += 1;
                    false
                }
            }
        });

        report
    }
}

/// Receiving side of one live connection.
pub struct Subscription {
    id: u64,
    connected_at: DateTime<Utc>,
    rx: Receiver<ReadingEvent>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Blocks until the next event; `None` once the broadcaster has stopped.
    pub fn recv(&self) -> Option<ReadingEvent> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<ReadingEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Result<ReadingEvent, TryRecvError> {
        self.rx.try_recv()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
