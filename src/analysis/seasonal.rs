//! Monthly seasonal pattern for one station.

use chrono::{DateTime, Months, Utc};
use serde::Serialize;

use crate::analysis::groupings;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{Reading, ReadingQuery};
use crate::store::{ReadingStore, StationStore};

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyAverage {
    /// 0 = January.
    pub month: u32,
    pub month_name: &'static str,
    pub average: f64,
    pub readings: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonalPattern {
    pub station_id: String,
    pub years: u32,
    pub total_readings: usize,
    pub seasonal_patterns: Vec<MonthlyAverage>,
}

/// Always twelve entries, January first; empty months report 0 / 0.
pub fn monthly_averages(readings: &[Reading]) -> Vec<MonthlyAverage> {
    groupings::group_by_month(readings)
        .iter()
        .zip(MONTH_NAMES)
        .enumerate()
        .map(|(month, (bucket, month_name))| MonthlyAverage {
            month: month as u32,
            month_name,
            average: bucket.average(),
            readings: bucket.count,
        })
        .collect()
}

/// Seasonal pattern over the last `years` years ending at `now`.
pub fn seasonal_pattern(
    stations: &dyn StationStore,
    readings: &dyn ReadingStore,
    station_id: &str,
    years: u32,
    now: DateTime<Utc>,
) -> ServiceResult<SeasonalPattern> {
    if stations.find_by_id(station_id)?.is_none() {
        return Err(ServiceError::NotFound(format!("Station {} not found", station_id)));
    }

    let since = now
        .checked_sub_months(Months::new(years.saturating_mul(12)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let series = readings.find_by_station(station_id, &ReadingQuery::window(since, now))?;
    if series.is_empty() {
        return Err(ServiceError::NoData(format!(
            "No data found for station {} in the last {} years",
            station_id, years
        )));
    }

    Ok(SeasonalPattern {
        station_id: station_id.to_string(),
        years,
        total_readings: series.len(),
        seasonal_patterns: monthly_averages(&series),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeoPoint, Station};
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    #[test]
    fn test_always_twelve_months() {
        let empty = monthly_averages(&[]);
        assert_eq!(empty.len(), 12);
        assert!(empty.iter().all(|m| m.average == 0.0 && m.readings == 0));
        assert_eq!(empty[0].month_name, "January");
        assert_eq!(empty[11].month, 11);

        let one = monthly_averages(&[Reading::new(
            "X",
            14.0,
            Utc.with_ymd_and_hms(2024, 7, 4, 0, 0, 0).unwrap(),
        )]);
        assert_eq!(one.len(), 12);
        assert_eq!(one[6].readings, 1);
        assert_eq!(one[6].average, 14.0);
        assert_eq!(one.iter().map(|m| m.readings).sum::<usize>(), 1);
    }

    #[test]
    fn test_window_excludes_older_readings() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let store = MemoryStore::with_stations(vec![Station {
            station_id: "DWLR-0002".to_string(),
            name: "Delhi Monitoring Station".to_string(),
            state: "Delhi".to_string(),
            district: "New Delhi".to_string(),
            location: GeoPoint { latitude: 28.7, longitude: 77.1 },
            baseline_value: 15.2,
        }]);
        store
            .append_many(&[
                Reading::new("DWLR-0002", 15.0, Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap()),
                Reading::new("DWLR-0002", 16.0, Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap()),
                Reading::new("DWLR-0002", 14.0, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
            ])
            .unwrap();

        let pattern = seasonal_pattern(&store, &store, "DWLR-0002", 2, now).unwrap();
        assert_eq!(pattern.total_readings, 2);
        assert_eq!(pattern.seasonal_patterns[2].average, 15.0);

        assert_eq!(
            seasonal_pattern(&store, &store, "NOPE", 2, now).unwrap_err().code(),
            "not_found"
        );
    }
}
