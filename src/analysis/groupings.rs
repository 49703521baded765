/// Reading grouping and data organization utilities.
///
/// `group_by_month` folds a flat list of `Reading`s into twelve calendar
/// month buckets, and `pair_with_latest` attaches each station's most recent
/// reading so callers can classify "where does every station stand right
/// now?" without issuing their own lookups.

use chrono::Datelike;

use crate::model::{Reading, Station};
use crate::store::{ReadingStore, StoreResult};

// ---------------------------------------------------------------------------
// Month buckets
// ---------------------------------------------------------------------------

/// Running total for one calendar month.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MonthBucket {
    pub sum: f64,
    pub count: usize,
}

impl MonthBucket {
    /// Mean level, or 0 for an empty month.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Buckets readings by UTC calendar month (index 0 = January), merging
/// years.
pub fn group_by_month(readings: &[Reading]) -> [MonthBucket; 12] {
    let mut buckets = [MonthBucket::default(); 12];
    for reading in readings {
        let bucket = &mut buckets[reading.timestamp.month0() as usize];
        bucket.sum += reading.water_level;
        bucket.count += 1;
    }
    buckets
}

// ---------------------------------------------------------------------------
// Latest reading per station
// ---------------------------------------------------------------------------

/// Pairs every station with its most recent reading, preserving order.
pub fn pair_with_latest(
    stations: Vec<Station>,
    readings: &dyn ReadingStore,
) -> StoreResult<Vec<(Station, Option<Reading>)>> {
    stations
        .into_iter()
        .map(|station| -> StoreResult<(Station, Option<Reading>)> {
            let latest = readings.find_latest(&station.station_id)?;
            Ok((station, latest))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GeoPoint;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn reading(level: f64, year: i32, month: u32, day: u32) -> Reading {
        Reading::new("DWLR-0001", level, Utc.with_ymd_and_hms(year, month, day, 6, 0, 0).unwrap())
    }

    #[test]
    fn test_group_by_month_merges_years() {
        let buckets = group_by_month(&[
            reading(10.0, 2023, 3, 1),
            reading(12.0, 2024, 3, 15),
            reading(8.0, 2024, 12, 31),
        ]);

        assert_eq!(buckets[2].count, 2);
        assert_eq!(buckets[2].average(), 11.0);
        assert_eq!(buckets[11].count, 1);
        assert_eq!(buckets[0], MonthBucket::default());
        assert_eq!(buckets[0].average(), 0.0);
    }

    #[test]
    fn test_month_boundary_uses_utc() {
        // 23:30 UTC on Jan 31 is already Feb 1 in IST, but buckets are UTC.
        let late = Reading::new("X", 1.0, Utc.with_ymd_and_hms(2024, 1, 31, 23, 30, 0).unwrap());
        let buckets = group_by_month(&[late]);
        assert_eq!(buckets[0].count, 1);
        assert_eq!(buckets[1].count, 0);
    }

    #[test]
    fn test_pair_with_latest_keeps_stations_without_readings() {
        let station = |id: &str| Station {
            station_id: id.to_string(),
            name: id.to_string(),
            state: "Goa".to_string(),
            district: "North Goa".to_string(),
            location: GeoPoint { latitude: 15.5, longitude: 73.8 },
            baseline_value: 10.0,
        };
        let store = MemoryStore::new();
        store.append(&reading(10.5, 2024, 5, 1)).unwrap();
        store.append(&reading(11.5, 2024, 5, 2)).unwrap();

        let pairs = pair_with_latest(vec![station("DWLR-0001"), station("DWLR-0002")], &store).unwrap();

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].1.as_ref().unwrap().water_level, 11.5);
        assert!(pairs[1].1.is_none());
    }
}
