//! Resynchronization snapshot: every station with its latest reading and
//! current status. Clients fetch this on (re)connect to the live stream
//! because the stream itself never replays.

use crate::alert::thresholds;
use crate::analysis::groupings;
use crate::error::ServiceResult;
use crate::model::StationWithStatus;
use crate::store::{ReadingStore, StationStore};

pub fn stations_with_status(
    stations: &dyn StationStore,
    readings: &dyn ReadingStore,
) -> ServiceResult<Vec<StationWithStatus>> {
    let pairs = groupings::pair_with_latest(stations.find_all()?, readings)?;

    pairs
        .into_iter()
        .map(|(station, latest)| -> ServiceResult<StationWithStatus> {
            let status = latest
                .as_ref()
                .map(|r| thresholds::classify_reading(r, &station))
                .transpose()?;
            Ok(StationWithStatus {
                latest_reading: latest.as_ref().map(|r| r.water_level),
                latest_timestamp: latest.as_ref().map(|r| r.timestamp),
                status,
                station,
            })
        })
        .collect()
}
