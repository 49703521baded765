/// Reference client state for the live dashboard.
///
/// A client resynchronizes from `/api/stations-with-status`, then follows
/// `/api/events`. These types hold what a dashboard keeps between frames:
///
/// - `LiveStationMap` — latest value and status per station
/// - `NotificationLog` — most recent alerts, newest first, capped
/// - `AlertCue` — audible cue chosen per alert tier
///
/// The `watch_alerts` binary drives them against a running service.

pub mod sse;

use std::collections::HashMap;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::model::{ReadingEvent, StationWithStatus, StatusTier};

/// Alerts kept by `NotificationLog`.
pub const NOTIFICATION_CAPACITY: usize = 10;

// ---------------------------------------------------------------------------
// Live station map
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct LiveStationMap {
    stations: HashMap<String, StationWithStatus>,
}

impl LiveStationMap {
    pub fn from_snapshot(snapshot: Vec<StationWithStatus>) -> Self {
        Self {
            stations: snapshot
                .into_iter()
                .map(|s| (s.station.station_id.clone(), s))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn get(&self, station_id: &str) -> Option<&StationWithStatus> {
        self.stations.get(station_id)
    }

    /// Applies a live event. Returns the station's previous status when the
    /// event was applied, `None` for unknown stations or events older than
    /// what the map already shows.
    pub fn apply(&mut self, event: &ReadingEvent) -> Option<Option<StatusTier>> {
        let entry = self.stations.get_mut(&event.station_id)?;
        if entry.latest_timestamp.is_some_and(|t| t > event.timestamp) {
            return None;
        }
        let previous = entry.status;
        entry.latest_reading = Some(event.water_level);
        entry.latest_timestamp = Some(event.timestamp);
        entry.status = Some(event.status());
        Some(previous)
    }

    /// Station counts per tier; stations without data are not counted.
    pub fn tier_counts(&self) -> HashMap<StatusTier, usize> {
        let mut counts = HashMap::new();
        for status in self.stations.values().filter_map(|s| s.status) {
            *counts.entry(status).or_insert(0) += 1;
        }
        counts
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub station_id: String,
    pub water_level: f64,
    pub timestamp: DateTime<Utc>,
    pub status: StatusTier,
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.status {
            StatusTier::Critical => "CRITICAL",
            StatusTier::Warning => "WARNING",
            StatusTier::Normal => "NORMAL",
        };
        write!(
            f,
            "{}: {} water level {:.2}m at {}",
            label,
            self.station_id,
            self.water_level,
            self.timestamp.format("%H:%M:%S")
        )
    }
}

#[derive(Debug)]
pub struct NotificationLog {
    entries: Vec<Notification>,
    capacity: usize,
}

impl Default for NotificationLog {
    fn default() -> Self {
        Self::with_capacity(NOTIFICATION_CAPACITY)
    }
}

impl NotificationLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Records an alerting event; normal readings are ignored.
    pub fn record(&mut self, event: &ReadingEvent) -> Option<&Notification> {
        let status = event.status();
        if !status.is_alert() {
            return None;
        }
        self.entries.insert(
            0,
            Notification {
                station_id: event.station_id.clone(),
                water_level: event.water_level,
                timestamp: event.timestamp,
                status,
            },
        );
        self.entries.truncate(self.capacity);
        self.entries.first()
    }

    /// Newest first.
    pub fn entries(&self) -> &[Notification] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ---------------------------------------------------------------------------
// Audible cue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertCue {
    pub frequency_hz: u32,
    pub duration: Duration,
}

impl AlertCue {
    pub const CRITICAL: AlertCue = AlertCue {
        frequency_hz: 880,
        duration: Duration::from_millis(500),
    };
    pub const WARNING: AlertCue = AlertCue {
        frequency_hz: 440,
        duration: Duration::from_millis(500),
    };

    pub fn for_status(status: StatusTier) -> Option<AlertCue> {
        match status {
            StatusTier::Critical => Some(Self::CRITICAL),
            StatusTier::Warning => Some(Self::WARNING),
            StatusTier::Normal => None,
        }
    }

    /// Terminal stand-in for a tone: the bell character.
    pub fn ring(&self, out: &mut impl Write) -> io::Result<()> {
        out.write_all(b"\x07")?;
        out.flush()
    }
}

/// Suppresses a new cue while the previous one is still sounding.
#[derive(Debug, Default)]
pub struct CueGate {
    busy_until: Option<Instant>,
}

impl CueGate {
    pub fn try_play(&mut self, cue: AlertCue, now: Instant) -> bool {
        if self.busy_until.is_some_and(|until| now < until) {
            return false;
        }
        self.busy_until = Some(now + cue.duration);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeoPoint, Station};
    use chrono::TimeZone;

    fn t(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, minute, 0).unwrap()
    }

    fn event(id: &str, level: f64, minute: u32, status: StatusTier) -> ReadingEvent {
        ReadingEvent {
            station_id: id.to_string(),
            water_level: level,
            timestamp: t(minute),
            is_critical: status == StatusTier::Critical,
            is_warning: status == StatusTier::Warning,
        }
    }

    fn snapshot_entry(id: &str) -> StationWithStatus {
        StationWithStatus {
            station: Station {
                station_id: id.to_string(),
                name: id.to_string(),
                state: "Delhi".to_string(),
                district: "New Delhi".to_string(),
                location: GeoPoint { latitude: 28.7, longitude: 77.1 },
                baseline_value: 10.0,
            },
            latest_reading: Some(10.0),
            latest_timestamp: Some(t(5)),
            status: Some(StatusTier::Normal),
        }
    }

    #[test]
    fn test_live_map_applies_newer_events_only() {
        let mut map = LiveStationMap::from_snapshot(vec![snapshot_entry("A")]);

        assert_eq!(map.apply(&event("A", 9.0, 4, StatusTier::Normal)), None, "stale event");
        assert_eq!(
            map.apply(&event("A", 12.5, 6, StatusTier::Critical)),
            Some(Some(StatusTier::Normal))
        );
        assert_eq!(map.get("A").unwrap().latest_reading, Some(12.5));
        assert_eq!(map.tier_counts().get(&StatusTier::Critical), Some(&1));

        assert_eq!(map.apply(&event("UNKNOWN", 1.0, 7, StatusTier::Normal)), None);
    }

    #[test]
    fn test_notification_log_caps_and_orders_newest_first() {
        let mut log = NotificationLog::default();
        assert!(log.record(&event("A", 10.0, 0, StatusTier::Normal)).is_none());

        for minute in 0..15 {
            log.record(&event("A", 12.0, minute, StatusTier::Warning));
        }
        assert_eq!(log.entries().len(), NOTIFICATION_CAPACITY);
        assert_eq!(log.entries()[0].timestamp, t(14));
        assert_eq!(log.entries()[9].timestamp, t(5));

        log.clear();
        assert!(log.entries().is_empty());
    }

    #[test]
    fn test_cue_selection_and_gate() {
        assert_eq!(AlertCue::for_status(StatusTier::Critical).unwrap().frequency_hz, 880);
        assert_eq!(AlertCue::for_status(StatusTier::Warning).unwrap().frequency_hz, 440);
        assert!(AlertCue::for_status(StatusTier::Normal).is_none());

        let mut gate = CueGate::default();
        let start = Instant::now();
        assert!(gate.try_play(AlertCue::WARNING, start));
        assert!(!gate.try_play(AlertCue::CRITICAL, start + Duration::from_millis(100)));
        assert!(gate.try_play(AlertCue::CRITICAL, start + Duration::from_millis(600)));

        let mut out = Vec::new();
        AlertCue::CRITICAL.ring(&mut out).unwrap();
        assert_eq!(out, b"\x07");
    }

    #[test]
    fn test_notification_display() {
        let mut log = NotificationLog::default();
        let shown = log.record(&event("DWLR-0001", 12.5, 3, StatusTier::Critical)).unwrap().to_string();
        assert_eq!(shown, "CRITICAL: DWLR-0001 water level 12.50m at 12:03:00");
    }
}
