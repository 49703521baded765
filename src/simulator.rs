/// Synthetic reading generator.
///
/// Stands in for field telemetry: on every tick one station is picked at
/// random, a water level is drawn uniformly within `fluctuation_m` of its
/// baseline, and the reading is stored, classified and broadcast.
///
/// `tick()` is the whole unit of work and can be driven directly. `spawn()`
/// runs it on a dedicated thread at a fixed interval. Ticks never overlap:
/// when a tick overruns its slot the missed slots are dropped rather than
/// replayed back-to-back.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::alert::thresholds::{self, ThresholdError};
use crate::broadcast::Broadcaster;
use crate::clock::Clock;
use crate::model::{Reading, ReadingEvent};
use crate::store::{ReadingStore, StationStore, StoreError};

/// Default half-width of the fluctuation band, meters.
pub const DEFAULT_FLUCTUATION_M: f64 = 2.0;

#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("no stations available to simulate")]
    NoStations,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cannot classify reading: {0}")]
    Classify(#[from] ThresholdError),
}

pub struct Simulator<R: Rng> {
    stations: Arc<dyn StationStore>,
    readings: Arc<dyn ReadingStore>,
    broadcaster: Arc<Broadcaster>,
    clock: Arc<dyn Clock>,
    rng: R,
    fluctuation_m: f64,
}

impl<R: Rng> Simulator<R> {
    pub fn new(
        stations: Arc<dyn StationStore>,
        readings: Arc<dyn ReadingStore>,
        broadcaster: Arc<Broadcaster>,
        clock: Arc<dyn Clock>,
        rng: R,
    ) -> Self {
        Self {
            stations,
            readings,
            broadcaster,
            clock,
            rng,
            fluctuation_m: DEFAULT_FLUCTUATION_M,
        }
    }

    pub fn with_fluctuation(mut self, fluctuation_m: f64) -> Self {
        self.fluctuation_m = fluctuation_m.abs();
        self
    }

    /// Generates, stores, classifies and publishes one reading.
    pub fn tick(&mut self) -> Result<ReadingEvent, SimulatorError> {
        let stations = self.stations.find_all()?;
        if stations.is_empty() {
            return Err(SimulatorError::NoStations);
        }

        let station = &stations[self.rng.gen_range(0..stations.len())];
        let delta = self.rng.gen_range(-self.fluctuation_m..=self.fluctuation_m);
        let reading = Reading::new(
            station.station_id.clone(),
            station.baseline_value + delta,
            self.clock.now(),
        );

        self.readings.append(&reading)?;
        let status = thresholds::classify_reading(&reading, station)?;
        let event = ReadingEvent::classified(&reading, status);

        let report = self.broadcaster.publish(&event);
        info!(
            station = %event.station_id,
            water_level = format_args!("{:.2}", event.water_level),
            %status,
            delivered = report.delivered,
            lagged = report.lagged,
            "simulated reading"
        );

        Ok(event)
    }

    fn run_tick(&mut self) {
        if let Err(e) = self.tick() {
            warn!(error = %e, "simulator tick skipped");
        }
    }
}

impl<R: Rng + Send + 'static> Simulator<R> {
    /// Runs `tick()` every `interval` on a dedicated thread until the
    /// returned handle is stopped or dropped.
    pub fn spawn(mut self, interval: Duration) -> std::io::Result<SimulatorHandle> {
        let interval = interval.max(Duration::from_millis(1));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("simulator".to_string())
            .spawn(move || {
                info!(interval_ms = interval.as_millis() as u64, "simulator started");
                let mut next = Instant::now() + interval;
                loop {
                    let wait = next.saturating_duration_since(Instant::now());
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {}
                        // Explicit stop, or the handle is gone.
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    self.run_tick();

                    next += interval;
                    let now = Instant::now();
                    if next <= now {
                        let missed = ((now - next).as_nanos() / interval.as_nanos()) as u32 + 1;
                        debug!(missed, "simulator tick overran, skipping slots");
                        next += interval * missed;
                    }
                }
                info!("simulator stopped");
            })?;

        Ok(SimulatorHandle {
            stop_tx,
            thread: Some(thread),
        })
    }
}

/// Owns the simulator thread. Dropping the handle also stops the loop, but
/// without waiting for it.
pub struct SimulatorHandle {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl SimulatorHandle {
    /// Signals the loop and waits for the in-flight tick, if any, to finish.
    pub fn stop(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("simulator thread panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
