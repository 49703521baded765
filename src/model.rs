/// Core data types for the groundwater monitoring service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O, only types and their trivial conversions.
///
/// Wire types serialize in camelCase because the dashboard client and the
/// live event stream both speak that dialect (`stationId`, `waterLevel`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Name of the push event carrying a freshly classified reading.
pub const EVENT_NEW_READING: &str = "new-reading";

// ---------------------------------------------------------------------------
// Station types
// ---------------------------------------------------------------------------

/// WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// A DWLR (Digital Water Level Recorder) monitoring station.
///
/// `baseline_value` is the reference water level used as the zero point for
/// status classification. Stations are provisioned by the seed process and
/// are not deleted during normal operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub station_id: String,
    pub name: String,
    pub state: String,
    pub district: String,
    pub location: GeoPoint,
    pub baseline_value: f64,
}

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// A single water-level observation, in meters.
///
/// Readings are append-only. `station_id` refers to a `Station` but the
/// reference is advisory; nothing enforces that the station exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub station_id: String,
    pub water_level: f64,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn new(station_id: impl Into<String>, water_level: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            station_id: station_id.into(),
            water_level,
            timestamp,
        }
    }
}

/// Time window and row cap for reading lookups. All bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingQuery {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl ReadingQuery {
    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            ..Self::default()
        }
    }

    pub fn window(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            until: Some(until),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `timestamp` falls inside the window (ignores `limit`).
    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        self.since.is_none_or(|s| *timestamp >= s) && self.until.is_none_or(|u| *timestamp <= u)
    }
}

// ---------------------------------------------------------------------------
// Status types
// ---------------------------------------------------------------------------

/// Status tier derived from a reading's deviation from its station baseline.
///
/// Never stored: always recomputed against the station's current baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTier {
    Normal,
    Warning,
    Critical,
}

impl StatusTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusTier::Normal => "normal",
            StatusTier::Warning => "warning",
            StatusTier::Critical => "critical",
        }
    }

    pub fn is_alert(&self) -> bool {
        !matches!(self, StatusTier::Normal)
    }
}

impl std::fmt::Display for StatusTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Push payloads
// ---------------------------------------------------------------------------

/// One classified reading as pushed to live subscribers.
///
/// `is_critical` and `is_warning` are mutually exclusive; both are false for
/// a normal reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingEvent {
    pub station_id: String,
    pub water_level: f64,
    pub timestamp: DateTime<Utc>,
    pub is_critical: bool,
    pub is_warning: bool,
}

impl ReadingEvent {
    pub fn classified(reading: &Reading, status: StatusTier) -> Self {
        Self {
            station_id: reading.station_id.clone(),
            water_level: reading.water_level,
            timestamp: reading.timestamp,
            is_critical: status == StatusTier::Critical,
            is_warning: status == StatusTier::Warning,
        }
    }

    /// Recovers the tier encoded by the two flags.
    pub fn status(&self) -> StatusTier {
        if self.is_critical {
            StatusTier::Critical
        } else if self.is_warning {
            StatusTier::Warning
        } else {
            StatusTier::Normal
        }
    }
}

/// A station merged with its most recent reading, used by clients to
/// resynchronize after (re)connecting to the live stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationWithStatus {
    #[serde(flatten)]
    pub station: Station,
    pub latest_reading: Option<f64>,
    pub latest_timestamp: Option<DateTime<Utc>>,
    pub status: Option<StatusTier>,
}
