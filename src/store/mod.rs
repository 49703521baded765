/// Station and reading persistence.
///
/// The service talks to its document/relational backend only through the
/// two traits below. Two implementations exist:
///
/// - `pg::PgStore` — the production store (schema `groundwater`).
/// - `memory::MemoryStore` — process-local store for dev mode and tests.
///
/// Both are shared across threads behind `Arc<dyn …>`.

use thiserror::Error;

use crate::model::{Reading, ReadingQuery, Station};

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend unreachable, or a lock/connection is unusable.
    #[error("{0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(#[from] postgres::Error),

    /// Stored data that cannot be interpreted (bad numeric, bad baseline).
    #[error("invalid stored data: {0}")]
    Invalid(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Station registry queries.
pub trait StationStore: Send + Sync {
    /// Every station. Unbounded; acceptable while the network is small.
    fn find_all(&self) -> StoreResult<Vec<Station>>;

    /// Stations whose `state` equals `region` exactly.
    fn find_by_region(&self, region: &str) -> StoreResult<Vec<Station>>;

    fn find_by_id(&self, station_id: &str) -> StoreResult<Option<Station>>;

    /// One page of stations ordered by id (`page` is 1-based) plus the total
    /// station count.
    fn find_page(&self, page: usize, limit: usize) -> StoreResult<(Vec<Station>, usize)>;

    /// Replaces the whole registry. Used only by bulk reseeding.
    fn replace_all(&self, stations: &[Station]) -> StoreResult<usize>;
}

/// Append-only time series of readings.
pub trait ReadingStore: Send + Sync {
    fn append(&self, reading: &Reading) -> StoreResult<()>;

    fn append_many(&self, readings: &[Reading]) -> StoreResult<usize>;

    /// Readings for one station inside the query window, oldest first,
    /// truncated to `query.limit` rows.
    fn find_by_station(&self, station_id: &str, query: &ReadingQuery) -> StoreResult<Vec<Reading>>;

    /// Most recent reading for a station, if any.
    fn find_latest(&self, station_id: &str) -> StoreResult<Option<Reading>>;

    fn count(&self) -> StoreResult<usize>;

    /// Deletes every reading. Used only by bulk reseeding.
    fn clear(&self) -> StoreResult<()>;
}
