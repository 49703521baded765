/// Process-local store backing `--in-memory` dev mode and the test suites.
///
/// Readings are kept per station in insertion order and sorted on demand, so
/// an out-of-order append (e.g. backfilled history) still reads back in
/// timestamp order.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{ReadingStore, StationStore, StoreError, StoreResult};
use crate::model::{Reading, ReadingQuery, Station};

#[derive(Debug, Default)]
pub struct MemoryStore {
    stations: RwLock<Vec<Station>>,
    readings: RwLock<HashMap<String, Vec<Reading>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store pre-populated with `stations`.
    pub fn with_stations(stations: Vec<Station>) -> Self {
        Self {
            stations: RwLock::new(stations),
            readings: RwLock::new(HashMap::new()),
        }
    }

    fn stations(&self) -> StoreResult<RwLockReadGuard<'_, Vec<Station>>> {
        self.stations
            .read()
            .map_err(|_| StoreError::Unavailable("station registry lock poisoned".into()))
    }

    fn stations_mut(&self) -> StoreResult<RwLockWriteGuard<'_, Vec<Station>>> {
        self.stations
            .write()
            .map_err(|_| StoreError::Unavailable("station registry lock poisoned".into()))
    }

    fn readings(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<String, Vec<Reading>>>> {
        self.readings
            .read()
            .map_err(|_| StoreError::Unavailable("reading store lock poisoned".into()))
    }

    fn readings_mut(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<String, Vec<Reading>>>> {
        self.readings
            .write()
            .map_err(|_| StoreError::Unavailable("reading store lock poisoned".into()))
    }
}

impl StationStore for MemoryStore {
    fn find_all(&self) -> StoreResult<Vec<Station>> {
        Ok(self.stations()?.clone())
    }

    fn find_by_region(&self, region: &str) -> StoreResult<Vec<Station>> {
        Ok(self
            .stations()?
            .iter()
            .filter(|s| s.state == region)
            .cloned()
            .collect())
    }

    fn find_by_id(&self, station_id: &str) -> StoreResult<Option<Station>> {
        Ok(self
            .stations()?
            .iter()
            .find(|s| s.station_id == station_id)
            .cloned())
    }

    fn find_page(&self, page: usize, limit: usize) -> StoreResult<(Vec<Station>, usize)> {
        let mut all = self.stations()?.clone();
        all.sort_by(|a, b| a.station_id.cmp(&b.station_id));
        let total = all.len();
        let skip = page.saturating_sub(1).saturating_mul(limit);
        let page = all.into_iter().skip(skip).take(limit).collect();
        Ok((page, total))
    }

    fn replace_all(&self, stations: &[Station]) -> StoreResult<usize> {
        let mut guard = self.stations_mut()?;
        *guard = stations.to_vec();
        Ok(guard.len())
    }
}

impl ReadingStore for MemoryStore {
    fn append(&self, reading: &Reading) -> StoreResult<()> {
        self.readings_mut()?
            .entry(reading.station_id.clone())
            .or_default()
            .push(reading.clone());
        Ok(())
    }

    fn append_many(&self, readings: &[Reading]) -> StoreResult<usize> {
        let mut guard = self.readings_mut()?;
        for reading in readings {
            guard
                .entry(reading.station_id.clone())
                .or_default()
                .push(reading.clone());
        }
        Ok(readings.len())
    }

    fn find_by_station(&self, station_id: &str, query: &ReadingQuery) -> StoreResult<Vec<Reading>> {
        let guard = self.readings()?;
        let mut matching: Vec<Reading> = guard
            .get(station_id)
            .map(|rs| rs.iter().filter(|r| query.contains(&r.timestamp)).cloned().collect())
            .unwrap_or_default();

        matching.sort_by_key(|r| r.timestamp);
        if let Some(limit) = query.limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }

    fn find_latest(&self, station_id: &str) -> StoreResult<Option<Reading>> {
        Ok(self
            .readings()?
            .get(station_id)
            .and_then(|rs| rs.iter().max_by_key(|r| r.timestamp))
            .cloned())
    }

    fn count(&self) -> StoreResult<usize> {
        Ok(self.readings()?.values().map(Vec::len).sum())
    }

    fn clear(&self) -> StoreResult<()> {
        self.readings_mut()?.clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GeoPoint;
    use chrono::{Duration, TimeZone, Utc};

    fn station(id: &str, state: &str) -> Station {
        Station {
            station_id: id.to_string(),
            name: format!("Station {}", id),
            state: state.to_string(),
            district: "Test".to_string(),
            location: GeoPoint { latitude: 19.0, longitude: 72.8 },
            baseline_value: 10.0,
        }
    }

    #[test]
    fn test_find_by_region_matches_state_exactly() {
        let store = MemoryStore::with_stations(vec![
            station("DWLR-0001", "Maharashtra"),
            station("DWLR-0002", "Delhi"),
            station("DWLR-0003", "Maharashtra"),
        ]);
        let found = store.find_by_region("Maharashtra").unwrap();
        assert_eq!(found.len(), 2);
        assert!(store.find_by_region("maharashtra").unwrap().is_empty());
    }

    #[test]
    fn test_find_page_is_one_based_and_reports_total() {
        let store = MemoryStore::with_stations(
            (1..=5).map(|i| station(&format!("DWLR-000{}", i), "Goa")).collect(),
        );
        let (page, total) = store.find_page(2, 2).unwrap();
        assert_eq!(total, 5);
        let ids: Vec<_> = page.iter().map(|s| s.station_id.as_str()).collect();
        assert_eq!(ids, vec!["DWLR-0003", "DWLR-0004"]);

        let (beyond, _) = store.find_page(4, 2).unwrap();
        assert!(beyond.is_empty());
    }

    #[test]
    fn test_readings_come_back_ordered_and_limited() {
        let store = MemoryStore::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        // Appended newest-first on purpose.
        for h in (0..5).rev() {
            store
                .append(&Reading::new("DWLR-0001", h as f64, t0 + Duration::hours(h)))
                .unwrap();
        }

        let all = store.find_by_station("DWLR-0001", &ReadingQuery::default()).unwrap();
        let levels: Vec<f64> = all.iter().map(|r| r.water_level).collect();
        assert_eq!(levels, vec![0.0, 1.0, 2.0, 3.0, 4.0]);

        let windowed = store
            .find_by_station(
                "DWLR-0001",
                &ReadingQuery::window(t0 + Duration::hours(1), t0 + Duration::hours(3)).with_limit(2),
            )
            .unwrap();
        let levels: Vec<f64> = windowed.iter().map(|r| r.water_level).collect();
        assert_eq!(levels, vec![1.0, 2.0]);
    }

    #[test]
    fn test_find_latest_and_clear() {
        let store = MemoryStore::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        store
            .append_many(&[
                Reading::new("DWLR-0001", 9.0, t0 + Duration::hours(2)),
                Reading::new("DWLR-0001", 8.0, t0),
            ])
            .unwrap();

        let latest = store.find_latest("DWLR-0001").unwrap().unwrap();
        assert_eq!(latest.water_level, 9.0);
        assert!(store.find_latest("DWLR-9999").unwrap().is_none());
        assert_eq!(store.count().unwrap(), 2);

        store.clear().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }
}
