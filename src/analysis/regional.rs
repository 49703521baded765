//! Regional status rollup.
//!
//! Every station in a region is classified on its single most recent
//! reading. Stations without readings are listed with a null status and
//! excluded from the tier counts, so
//! `critical + warning + normal == stations_with_data` always holds.

use serde::Serialize;

use crate::alert::thresholds::{self, ThresholdError};
use crate::analysis::groupings;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{Reading, Station, StatusTier};
use crate::store::{ReadingStore, StationStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionalStation {
    pub station_id: String,
    pub name: String,
    pub district: String,
    pub latest_reading: Option<f64>,
    pub status: Option<StatusTier>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionalRollup {
    pub region: String,
    pub total_stations: usize,
    pub stations_with_data: usize,
    pub critical_stations: usize,
    pub warning_stations: usize,
    pub normal_stations: usize,
    pub stations: Vec<RegionalStation>,
}

/// Builds the rollup from stations already paired with their latest reading.
pub fn rollup(region: &str, pairs: &[(Station, Option<Reading>)]) -> Result<RegionalRollup, ThresholdError> {
    let mut summary = RegionalRollup {
        region: region.to_string(),
        total_stations: pairs.len(),
        stations_with_data: 0,
        critical_stations: 0,
        warning_stations: 0,
        normal_stations: 0,
        stations: Vec::with_capacity(pairs.len()),
    };

    for (station, latest) in pairs {
        let status = latest
            .as_ref()
            .map(|r| thresholds::classify_reading(r, station))
            .transpose()?;

        if let Some(tier) = status {
            summary.stations_with_data += 1;
            match tier {
                StatusTier::Critical => summary.critical_stations += 1,
                StatusTier::Warning => summary.warning_stations += 1,
                StatusTier::Normal => summary.normal_stations += 1,
            }
        }

        summary.stations.push(RegionalStation {
            station_id: station.station_id.clone(),
            name: station.name.clone(),
            district: station.district.clone(),
            latest_reading: latest.as_ref().map(|r| r.water_level),
            status,
        });
    }

    Ok(summary)
}

/// Rollup for every station whose state equals `region`.
pub fn regional_rollup(
    stations: &dyn StationStore,
    readings: &dyn ReadingStore,
    region: &str,
) -> ServiceResult<RegionalRollup> {
    let members = stations.find_by_region(region)?;
    if members.is_empty() {
        return Err(ServiceError::NotFound(format!("No stations found in region {}", region)));
    }

    let pairs = groupings::pair_with_latest(members, readings)?;
    let summary = rollup(region, &pairs)?;
    if summary.stations_with_data == 0 {
        return Err(ServiceError::NoData(format!(
            "Stations in region {} have no readings yet",
            region
        )));
    }
    Ok(summary)
}
