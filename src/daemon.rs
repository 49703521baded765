/// Service assembly and lifecycle
///
/// This module wires the running service together:
/// 1. Opens the station and reading stores (PostgreSQL, or in-memory for dev)
/// 2. Provisions stations from the seed registry if the store is empty
/// 3. Backfills a short synthetic history if no readings exist
/// 4. Starts the broadcaster and the HTTP endpoint
/// 5. Starts the reading simulator
///
/// A store that cannot be reached at startup is fatal. Everything after
/// startup logs and carries on.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::TokenVerifier;
use crate::broadcast::Broadcaster;
use crate::clock::Clock;
use crate::config::ServiceConfig;
use crate::db::DbConfigError;
use crate::endpoint::{AppContext, EndpointError, EndpointHandle, EndpointServer};
use crate::seed::{self, HistoryPlan, SeedError};
use crate::simulator::{Simulator, SimulatorHandle};
use crate::store::{MemoryStore, PgStore, ReadingStore, StationStore};

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("database setup failed:\n{0}")]
    Database(#[from] DbConfigError),

    #[error("seeding failed: {0}")]
    Seed(#[from] SeedError),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// The station and reading stores, usually one object behind both traits.
#[derive(Clone)]
pub struct Stores {
    pub stations: Arc<dyn StationStore>,
    pub readings: Arc<dyn ReadingStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            stations: store.clone(),
            readings: store,
        }
    }

    /// Connects to PostgreSQL via `DATABASE_URL` and verifies the schema.
    pub fn postgres() -> Result<Self, DbConfigError> {
        let store = Arc::new(PgStore::connect()?);
        Ok(Self {
            stations: store.clone(),
            readings: store,
        })
    }
}

/// A running service instance.
pub struct Service {
    broadcaster: Arc<Broadcaster>,
    endpoint: EndpointHandle,
    simulator: Option<SimulatorHandle>,
}

impl Service {
    pub fn start(config: &ServiceConfig, stores: Stores, clock: Arc<dyn Clock>) -> Result<Self, DaemonError> {
        let mut rng = StdRng::from_entropy();

        let station_count = seed::ensure_stations(stores.stations.as_ref(), &config.seed.stations_file, &config.region)?;
        info!(stations = station_count, "station registry ready");

        seed::backfill_if_empty(
            stores.stations.as_ref(),
            stores.readings.as_ref(),
            HistoryPlan::startup(config.seed.history_hours),
            clock.now(),
            &mut rng,
        )?;

        let broadcaster = Arc::new(Broadcaster::new(config.broadcast.subscriber_buffer, clock.clone()));
        broadcaster.start();

        let auth = match &config.auth.secret {
            Some(secret) => Some(TokenVerifier::new(secret.clone())),
            None => {
                warn!("no auth secret configured; authentication is DISABLED");
                None
            }
        };

        let ctx = Arc::new(AppContext {
            stations: stores.stations.clone(),
            readings: stores.readings.clone(),
            broadcaster: broadcaster.clone(),
            clock: clock.clone(),
            auth,
        });

        let addr = format!("{}:{}", config.server.bind, config.server.port);
        let endpoint = EndpointServer::bind(&addr, ctx, config.server.worker_threads)?.spawn()?;

        let simulator = if config.simulator.enabled {
            let handle = Simulator::new(stores.stations, stores.readings, broadcaster.clone(), clock, rng)
                .with_fluctuation(config.simulator.fluctuation_m)
                .spawn(config.simulator.interval())?;
            Some(handle)
        } else {
            info!("simulator disabled");
            None
        };

        Ok(Self {
            broadcaster,
            endpoint,
            simulator,
        })
    }

    pub fn port(&self) -> Option<u16> {
        self.endpoint.port()
    }

    /// Blocks until the HTTP endpoint stops.
    pub fn wait(self) {
        self.endpoint.wait();
    }

    /// Stops the simulator, disconnects live subscribers and closes the
    /// endpoint, in that order.
    pub fn shutdown(self) {
        if let Some(simulator) = self.simulator {
            simulator.stop();
        }
        self.broadcaster.stop();
        self.endpoint.shutdown();
        info!("service stopped");
    }
}
