//! Water-level trend over a trailing window.
//!
//! The trend compares the first and last reading in the window. Its
//! direction uses its own ±5 % band, independent of the 10/20 % per-reading
//! status thresholds in `alert::thresholds`.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::{ServiceError, ServiceResult};
use crate::model::{Reading, ReadingQuery};
use crate::store::{ReadingStore, StationStore};

/// Change (percent of the first reading) beyond which a window is rising or
/// falling.
pub const TREND_DIRECTION_THRESHOLD_PERCENT: f64 = 5.0;

/// Most recent readings echoed back with a trend response.
pub const TREND_READINGS_IN_RESPONSE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub direction: TrendDirection,
    /// `None` when the first reading is exactly zero.
    pub percentage_change: Option<f64>,
    pub change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingStatistics {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationTrend {
    pub station_id: String,
    pub station_name: String,
    pub period_days: u32,
    pub readings_count: usize,
    pub trend: TrendSummary,
    pub statistics: ReadingStatistics,
    pub readings: Vec<Reading>,
}

pub fn direction_for_change(percentage_change: Option<f64>) -> TrendDirection {
    match percentage_change {
        Some(pct) if pct > TREND_DIRECTION_THRESHOLD_PERCENT => TrendDirection::Rising,
        Some(pct) if pct < -TREND_DIRECTION_THRESHOLD_PERCENT => TrendDirection::Falling,
        _ => TrendDirection::Stable,
    }
}

/// First-to-last change of an ascending series. `None` for an empty series.
pub fn summarize_trend(readings: &[Reading]) -> Option<TrendSummary> {
    let first = readings.first()?.water_level;
    let last = readings.last()?.water_level;
    let change = last - first;
    let percentage_change = (first != 0.0).then(|| change / first * 100.0);
    Some(TrendSummary {
        direction: direction_for_change(percentage_change),
        percentage_change,
        change,
    })
}

pub fn statistics(readings: &[Reading]) -> Option<ReadingStatistics> {
    if readings.is_empty() {
        return None;
    }
    let (sum, min, max) = readings.iter().map(|r| r.water_level).fold(
        (0.0, f64::INFINITY, f64::NEG_INFINITY),
        |(sum, min, max), v| (sum + v, min.min(v), max.max(v)),
    );
    Some(ReadingStatistics {
        average: sum / readings.len() as f64,
        min,
        max,
        range: max - min,
    })
}

/// Trend for one station over the last `days` days ending at `now`.
pub fn station_trend(
    stations: &dyn StationStore,
    readings: &dyn ReadingStore,
    station_id: &str,
    days: u32,
    now: DateTime<Utc>,
) -> ServiceResult<StationTrend> {
    let station = stations
        .find_by_id(station_id)?
        .ok_or_else(|| ServiceError::NotFound(format!("Station {} not found", station_id)))?;

    let window = ReadingQuery::window(now - Duration::days(i64::from(days)), now);
    let mut series = readings.find_by_station(station_id, &window)?;

    let no_data = || ServiceError::NoData(format!("No data found for station {} in the last {} days", station_id, days));
    let trend = summarize_trend(&series).ok_or_else(no_data)?;
    let stats = statistics(&series).ok_or_else(no_data)?;

    let readings_count = series.len();
    let tail = series.len().saturating_sub(TREND_READINGS_IN_RESPONSE);
    series.drain(..tail);

    Ok(StationTrend {
        station_id: station.station_id,
        station_name: station.name,
        period_days: days,
        readings_count,
        trend,
        statistics: stats,
        readings: series,
    })
}
