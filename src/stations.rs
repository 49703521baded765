/// Station seed registry - parses stations.toml
///
/// Defines the DWLR stations provisioned into the station store on first
/// start or on a bulk reseed. After provisioning the store is the source of
/// truth; this file is only read by the seeding paths.
///
/// Every entry is validated before it reaches the store: unique ids, a
/// positive finite baseline, and coordinates inside the deployment region.

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::RegionBounds;
use crate::model::{GeoPoint, Station};

#[derive(Debug, Error)]
pub enum StationConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("station '{station_id}': {reason}")]
    Invalid { station_id: String, reason: String },

    #[error("duplicate station id '{0}'")]
    Duplicate(String),
}

/// Station metadata as written in stations.toml
#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    pub station_id: String,
    pub name: String,
    pub state: String,
    pub district: String,

    // Geographic location
    pub latitude: f64,
    pub longitude: f64,

    /// Reference water level (m) used as the classification anchor.
    pub baseline_value: f64,
}

impl From<StationConfig> for Station {
    fn from(config: StationConfig) -> Self {
        Station {
            station_id: config.station_id,
            name: config.name,
            state: config.state,
            district: config.district,
            location: GeoPoint {
                latitude: config.latitude,
                longitude: config.longitude,
            },
            baseline_value: config.baseline_value,
        }
    }
}

/// Root configuration structure for TOML parsing
#[derive(Debug, Deserialize)]
struct StationRegistry {
    station: Vec<StationConfig>,
}

/// Checks a single station against the registry rules.
pub fn validate_station(station: &Station, region: &RegionBounds) -> Result<(), StationConfigError> {
    let invalid = |reason: String| StationConfigError::Invalid {
        station_id: station.station_id.clone(),
        reason,
    };

    if station.station_id.trim().is_empty() {
        return Err(invalid("station id must not be empty".into()));
    }
    if station.name.trim().is_empty() {
        return Err(invalid("name must not be empty".into()));
    }
    if station.state.trim().is_empty() {
        return Err(invalid("state must not be empty".into()));
    }
    if !(station.baseline_value.is_finite() && station.baseline_value > 0.0) {
        return Err(invalid(format!(
            "baseline must be a positive number, got {}",
            station.baseline_value
        )));
    }
    let GeoPoint { latitude, longitude } = station.location;
    if !region.contains(latitude, longitude) {
        return Err(invalid(format!(
            "coordinates ({}, {}) fall outside the deployment region",
            latitude, longitude
        )));
    }
    Ok(())
}

/// Parses and validates a station registry from TOML text.
pub fn parse_stations(
    contents: &str,
    path: &Path,
    region: &RegionBounds,
) -> Result<Vec<Station>, StationConfigError> {
    let registry: StationRegistry = toml::from_str(contents).map_err(|source| StationConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut seen = HashSet::new();
    let mut stations = Vec::with_capacity(registry.station.len());

    for entry in registry.station {
        let station = Station::from(entry);
        validate_station(&station, region)?;
        if !seen.insert(station.station_id.clone()) {
            return Err(StationConfigError::Duplicate(station.station_id));
        }
        stations.push(station);
    }

    Ok(stations)
}

/// Loads the station registry from a stations.toml file.
pub fn load_stations(path: &Path, region: &RegionBounds) -> Result<Vec<Station>, StationConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| StationConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_stations(&contents, path, region)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_STATIONS: &str = r#"
        [[station]]
        station_id = "DWLR-0001"
        name = "Mumbai Central Station"
        state = "Maharashtra"
        district = "Mumbai"
        latitude = 19.0760
        longitude = 72.8777
        baseline_value = 12.5

        [[station]]
        station_id = "DWLR-0002"
        name = "Delhi Monitoring Station"
        state = "Delhi"
        district = "New Delhi"
        latitude = 28.7041
        longitude = 77.1025
        baseline_value = 15.2
    "#;

    fn parse(text: &str) -> Result<Vec<Station>, StationConfigError> {
        parse_stations(text, Path::new("stations.toml"), &RegionBounds::default())
    }

    #[test]
    fn test_parse_valid_registry() {
        let stations = parse(TWO_STATIONS).unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].station_id, "DWLR-0001");
        assert_eq!(stations[0].location.latitude, 19.0760);
        assert_eq!(stations[1].baseline_value, 15.2);
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let doubled = TWO_STATIONS.replace("DWLR-0002", "DWLR-0001");
        assert!(matches!(parse(&doubled), Err(StationConfigError::Duplicate(id)) if id == "DWLR-0001"));
    }

    #[test]
    fn test_non_positive_baseline_is_rejected() {
        let zeroed = TWO_STATIONS.replace("baseline_value = 12.5", "baseline_value = 0.0");
        let err = parse(&zeroed).unwrap_err();
        assert!(err.to_string().contains("baseline"), "got: {}", err);
    }

    #[test]
    fn test_coordinates_outside_region_are_rejected() {
        // lat/lng swapped, a classic GeoJSON mistake
        let swapped = TWO_STATIONS
            .replace("latitude = 19.0760", "latitude = 72.8777")
            .replace("longitude = 72.8777", "longitude = 19.0760");
        let err = parse(&swapped).unwrap_err();
        assert!(err.to_string().contains("deployment region"), "got: {}", err);
    }

    #[test]
    fn test_bundled_registry_is_valid() {
        let stations = load_stations(Path::new("stations.toml"), &RegionBounds::default())
            .expect("bundled stations.toml should load");
        assert!(stations.len() >= 5, "Should have at least 5 stations");
        assert!(stations.iter().any(|s| s.station_id == "DWLR-0001"));
    }
}
