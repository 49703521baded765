/// Station provisioning and synthetic history.
///
/// Two entry points:
///
/// - service start: `ensure_stations` loads the seed registry into an empty
///   station store, then `backfill_if_empty` writes a short hourly history
///   so the dashboard has something to draw before the simulator catches up.
/// - `seed_stations` binary: `reseed` wipes readings, replaces the registry
///   and writes a longer, noisier history.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;
use tracing::info;

use crate::config::RegionBounds;
use crate::model::{Reading, Station};
use crate::stations::{self, StationConfigError};
use crate::store::{ReadingStore, StationStore, StoreError};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Stations(#[from] StationConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Shape of a generated history: `readings` hourly points per station,
/// ending at the reference time, each within `fluctuation_m` of baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryPlan {
    pub readings: u32,
    pub fluctuation_m: f64,
    /// Round generated levels to centimeters.
    pub round_to_cm: bool,
}

impl HistoryPlan {
    /// Start-up backfill: one reading per hour over `hours`, ±1 m, rounded.
    pub fn startup(hours: u32) -> Self {
        Self {
            readings: hours,
            fluctuation_m: 1.0,
            round_to_cm: true,
        }
    }

    /// Bulk reseed: 48 hours inclusive of both ends, ±2 m.
    pub fn reseed() -> Self {
        Self {
            readings: 49,
            fluctuation_m: 2.0,
            round_to_cm: false,
        }
    }
}

/// Generates hourly readings for every station, oldest first per station.
pub fn generate_history<R: Rng>(
    stations: &[Station],
    plan: HistoryPlan,
    end: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Reading> {
    let mut readings = Vec::with_capacity(stations.len() * plan.readings as usize);
    for station in stations {
        for hours_ago in (0..plan.readings).rev() {
            let delta = rng.gen_range(-plan.fluctuation_m..=plan.fluctuation_m);
            let mut level = station.baseline_value + delta;
            if plan.round_to_cm {
                level = (level * 100.0).round() / 100.0;
            }
            readings.push(Reading::new(
                station.station_id.clone(),
                level,
                end - Duration::hours(i64::from(hours_ago)),
            ));
        }
    }
    readings
}

/// Loads the seed registry when the station store is empty.
///
/// Returns how many stations the store holds afterwards.
pub fn ensure_stations(
    store: &dyn StationStore,
    seed_file: &Path,
    region: &RegionBounds,
) -> Result<usize, SeedError> {
    let existing = store.find_all()?;
    if !existing.is_empty() {
        return Ok(existing.len());
    }

    let registry = stations::load_stations(seed_file, region)?;
    let written = store.replace_all(&registry)?;
    info!(stations = written, file = %seed_file.display(), "provisioned stations from seed registry");
    Ok(written)
}

/// Writes a start-up history when the reading store holds nothing at all.
///
/// Returns the number of readings written (0 if readings already existed).
pub fn backfill_if_empty<R: Rng>(
    stations: &dyn StationStore,
    readings: &dyn ReadingStore,
    plan: HistoryPlan,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<usize, SeedError> {
    let existing = readings.count()?;
    if existing > 0 {
        info!(readings = existing, "reading history present, skipping backfill");
        return Ok(0);
    }

    let registry = stations.find_all()?;
    let history = generate_history(&registry, plan, now, rng);
    let written = readings.append_many(&history)?;
    info!(readings = written, stations = registry.len(), "backfilled synthetic history");
    Ok(written)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReseedSummary {
    pub stations: usize,
    pub readings: usize,
}

/// Replaces every station and reading with `registry` and fresh history.
///
/// Not atomic across the two stores. Readings are only cleared once the
/// station replace has succeeded, so a failed replace leaves the old data
/// untouched; a failure while appending leaves a partial history that a
/// rerun overwrites. Only the `seed_stations` tool calls this.
pub fn reseed<R: Rng>(
    stations: &dyn StationStore,
    readings: &dyn ReadingStore,
    registry: &[Station],
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<ReseedSummary, SeedError> {
    let station_count = stations.replace_all(registry)?;
    readings.clear()?;
    let history = generate_history(registry, HistoryPlan::reseed(), now, rng);
    let reading_count = readings.append_many(&history)?;
    Ok(ReseedSummary {
        stations: station_count,
        readings: reading_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeoPoint, ReadingQuery};
    use crate::store::{MemoryStore, StoreResult};
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn station(id: &str, baseline: f64) -> Station {
        Station {
            station_id: id.to_string(),
            name: id.to_string(),
            state: "Delhi".to_string(),
            district: "New Delhi".to_string(),
            location: GeoPoint {
                latitude: 28.7,
                longitude: 77.1,
            },
            baseline_value: baseline,
        }
    }

    #[test]
    fn test_startup_history_is_hourly_rounded_and_bounded() {
        let mut rng = StdRng::seed_from_u64(1);
        let history = generate_history(&[station("A", 15.2)], HistoryPlan::startup(24), now(), &mut rng);

        assert_eq!(history.len(), 24);
        assert_eq!(history.last().unwrap().timestamp, now());
        assert_eq!(history[0].timestamp, now() - Duration::hours(23));
        for r in &history {
            assert!((r.water_level - 15.2).abs() <= 1.0 + 1e-9);
            let cents = r.water_level * 100.0;
            assert!((cents - cents.round()).abs() < 1e-6, "{} not rounded", r.water_level);
        }
    }

    #[test]
    fn test_backfill_only_when_store_is_empty() {
        let store = MemoryStore::with_stations(vec![station("A", 10.0), station("B", 12.0)]);
        let mut rng = StdRng::seed_from_u64(2);

        let first = backfill_if_empty(&store, &store, HistoryPlan::startup(24), now(), &mut rng).unwrap();
        assert_eq!(first, 48);
        let second = backfill_if_empty(&store, &store, HistoryPlan::startup(24), now(), &mut rng).unwrap();
        assert_eq!(second, 0);
        assert_eq!(store.count().unwrap(), 48);
    }

    #[test]
    fn test_reseed_replaces_everything() {
        let store = MemoryStore::with_stations(vec![station("OLD", 10.0)]);
        store.append(&Reading::new("OLD", 10.0, now())).unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        let summary = reseed(&store, &store, &[station("NEW", 9.5)], now(), &mut rng).unwrap();

        assert_eq!(summary, ReseedSummary { stations: 1, readings: 49 });
        assert!(store.find_by_id("OLD").unwrap().is_none());
        assert!(store.find_by_station("OLD", &ReadingQuery::default()).unwrap().is_empty());
        let fresh = store.find_by_station("NEW", &ReadingQuery::default()).unwrap();
        assert_eq!(fresh.first().unwrap().timestamp, now() - Duration::hours(48));
    }

    /// Station store that accepts reads but refuses bulk replacement.
    struct ReadOnlyStations(MemoryStore);

    impl StationStore for ReadOnlyStations {
        fn find_all(&self) -> StoreResult<Vec<Station>> {
            self.0.find_all()
        }

        fn find_by_region(&self, region: &str) -> StoreResult<Vec<Station>> {
            self.0.find_by_region(region)
        }

        fn find_by_id(&self, station_id: &str) -> StoreResult<Option<Station>> {
            self.0.find_by_id(station_id)
        }

        fn find_page(&self, page: usize, limit: usize) -> StoreResult<(Vec<Station>, usize)> {
            self.0.find_page(page, limit)
        }

        fn replace_all(&self, _stations: &[Station]) -> StoreResult<usize> {
            Err(StoreError::Unavailable("read-only".into()))
        }
    }

    #[test]
    fn test_failed_station_replace_keeps_readings() {
        let stations = ReadOnlyStations(MemoryStore::with_stations(vec![station("OLD", 10.0)]));
        let readings = MemoryStore::new();
        readings.append(&Reading::new("OLD", 10.0, now())).unwrap();
        let mut rng = StdRng::seed_from_u64(4);

        let result = reseed(&stations, &readings, &[station("NEW", 9.5)], now(), &mut rng);

        assert!(matches!(result, Err(SeedError::Store(_))));
        assert_eq!(readings.count().unwrap(), 1);
        assert!(stations.find_by_id("OLD").unwrap().is_some());
    }

    #[test]
    fn test_ensure_stations_keeps_existing_registry() {
        let store = MemoryStore::with_stations(vec![station("A", 10.0)]);
        let count = ensure_stations(&store, Path::new("missing.toml"), &RegionBounds::default()).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_ensure_stations_loads_seed_file_into_empty_store() {
        let store = MemoryStore::new();
        let count = ensure_stations(&store, Path::new("stations.toml"), &RegionBounds::default()).unwrap();
        assert!(count >= 5);
        assert_eq!(store.find_all().unwrap().len(), count);
    }
}
