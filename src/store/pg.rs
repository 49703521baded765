/// PostgreSQL-backed station and reading store.
///
/// Tables live in the `groundwater` schema (see
/// `sql/001_groundwater_schema.sql`). Water levels and baselines are stored
/// as NUMERIC and converted through `rust_decimal` at the boundary.
///
/// A single connection is shared behind a mutex; the workload is one
/// periodic writer plus light dashboard reads.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use postgres::{Client, Row};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use super::{ReadingStore, StationStore, StoreError, StoreResult};
use crate::db::{self, DbConfigError};
use crate::model::{GeoPoint, Reading, ReadingQuery, Station};

/// Schemas the store requires at startup.
pub const REQUIRED_SCHEMAS: &[&str] = &["groundwater"];

pub struct PgStore {
    client: Mutex<Client>,
}

impl PgStore {
    pub fn new(client: Client) -> Self {
        Self {
            client: Mutex::new(client),
        }
    }

    /// Connects using `DATABASE_URL` and verifies the required schemas.
    pub fn connect() -> Result<Self, DbConfigError> {
        let client = db::connect_and_verify(REQUIRED_SCHEMAS)?;
        Ok(Self::new(client))
    }

    fn client(&self) -> StoreResult<MutexGuard<'_, Client>> {
        self.client
            .lock()
            .map_err(|_| StoreError::Unavailable("database connection lock poisoned".into()))
    }
}

// ---------------------------------------------------------------------------
// Row conversion
// ---------------------------------------------------------------------------

fn to_decimal(value: f64) -> StoreResult<Decimal> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(4))
        .ok_or_else(|| StoreError::Invalid(format!("cannot store {} as NUMERIC", value)))
}

fn from_decimal(value: Decimal) -> StoreResult<f64> {
    value
        .to_f64()
        .ok_or_else(|| StoreError::Invalid(format!("NUMERIC {} out of f64 range", value)))
}

const STATION_COLUMNS: &str =
    "station_id, name, state, district, latitude, longitude, baseline_value";

fn station_from_row(row: &Row) -> StoreResult<Station> {
    Ok(Station {
        station_id: row.get(0),
        name: row.get(1),
        state: row.get(2),
        district: row.get(3),
        location: GeoPoint {
            latitude: row.get(4),
            longitude: row.get(5),
        },
        baseline_value: from_decimal(row.get(6))?,
    })
}

fn reading_from_row(row: &Row) -> StoreResult<Reading> {
    let water_level: Decimal = row.get(1);
    let timestamp: DateTime<Utc> = row.get(2);
    Ok(Reading {
        station_id: row.get(0),
        water_level: from_decimal(water_level)?,
        timestamp,
    })
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

impl StationStore for PgStore {
    fn find_all(&self) -> StoreResult<Vec<Station>> {
        let rows = self.client()?.query(
            &format!("SELECT {} FROM groundwater.stations ORDER BY station_id", STATION_COLUMNS),
            &[],
        )?;
        rows.iter().map(station_from_row).collect()
    }

    fn find_by_region(&self, region: &str) -> StoreResult<Vec<Station>> {
        let rows = self.client()?.query(
            &format!(
                "SELECT {} FROM groundwater.stations WHERE state = $1 ORDER BY station_id",
                STATION_COLUMNS
            ),
            &[&region],
        )?;
        rows.iter().map(station_from_row).collect()
    }

    fn find_by_id(&self, station_id: &str) -> StoreResult<Option<Station>> {
        let rows = self.client()?.query(
            &format!("SELECT {} FROM groundwater.stations WHERE station_id = $1", STATION_COLUMNS),
            &[&station_id],
        )?;
        rows.first().map(station_from_row).transpose()
    }

    fn find_page(&self, page: usize, limit: usize) -> StoreResult<(Vec<Station>, usize)> {
        let offset = page
            .checked_sub(1)
            .and_then(|p| p.checked_mul(limit))
            .and_then(|o| i64::try_from(o).ok())
            .ok_or_else(|| StoreError::Invalid(format!("page {} of size {} is out of range", page, limit)))?;
        let limit = i64::try_from(limit).map_err(|_| StoreError::Invalid(format!("page size {} is out of range", limit)))?;

        let mut client = self.client()?;
        let rows = client.query(
            &format!(
                "SELECT {} FROM groundwater.stations ORDER BY station_id OFFSET $1 LIMIT $2",
                STATION_COLUMNS
            ),
            &[&offset, &limit],
        )?;
        let total: i64 = client
            .query_one("SELECT COUNT(*) FROM groundwater.stations", &[])?
            .get(0);

        let stations = rows.iter().map(station_from_row).collect::<StoreResult<Vec<_>>>()?;
        Ok((stations, total as usize))
    }

    fn replace_all(&self, stations: &[Station]) -> StoreResult<usize> {
        let mut client = self.client()?;
        let mut tx = client.transaction()?;
        tx.execute("DELETE FROM groundwater.stations", &[])?;

        for station in stations {
            let baseline = to_decimal(station.baseline_value)?;
            tx.execute(
                "INSERT INTO groundwater.stations
                 (station_id, name, state, district, latitude, longitude, baseline_value)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
                &[
                    &station.station_id,
                    &station.name,
                    &station.state,
                    &station.district,
                    &station.location.latitude,
                    &station.location.longitude,
                    &baseline,
                ],
            )?;
        }

        tx.commit()?;
        Ok(stations.len())
    }
}

impl ReadingStore for PgStore {
    fn append(&self, reading: &Reading) -> StoreResult<()> {
        let level = to_decimal(reading.water_level)?;
        self.client()?.execute(
            "INSERT INTO groundwater.readings (station_id, water_level, reading_time)
             VALUES ($1, $2, $3)",
            &[&reading.station_id, &level, &reading.timestamp],
        )?;
        Ok(())
    }

    fn append_many(&self, readings: &[Reading]) -> StoreResult<usize> {
        let mut client = self.client()?;
        let mut tx = client.transaction()?;
        let statement = tx.prepare(
            "INSERT INTO groundwater.readings (station_id, water_level, reading_time)
             VALUES ($1, $2, $3)",
        )?;

        let mut inserted = 0;
        for reading in readings {
            let level = to_decimal(reading.water_level)?;
            inserted += tx.execute(&statement, &[&reading.station_id, &level, &reading.timestamp])?;
        }

        tx.commit()?;
        Ok(inserted as usize)
    }

    fn find_by_station(&self, station_id: &str, query: &ReadingQuery) -> StoreResult<Vec<Reading>> {
        // LIMIT NULL means no limit in PostgreSQL.
        let limit: Option<i64> = query.limit.map(|l| l as i64);
        let rows = self.client()?.query(
            "SELECT station_id, water_level, reading_time
             FROM groundwater.readings
             WHERE station_id = $1
               AND ($2::timestamptz IS NULL OR reading_time >= $2)
               AND ($3::timestamptz IS NULL OR reading_time <= $3)
             ORDER BY reading_time ASC
             LIMIT $4",
            &[&station_id, &query.since, &query.until, &limit],
        )?;
        rows.iter().map(reading_from_row).collect()
    }

    fn find_latest(&self, station_id: &str) -> StoreResult<Option<Reading>> {
        let rows = self.client()?.query(
            "SELECT station_id, water_level, reading_time
             FROM groundwater.readings
             WHERE station_id = $1
             ORDER BY reading_time DESC
             LIMIT 1",
            &[&station_id],
        )?;
        rows.first().map(reading_from_row).transpose()
    }

    fn count(&self) -> StoreResult<usize> {
        let count: i64 = self
            .client()?
            .query_one("SELECT COUNT(*) FROM groundwater.readings", &[])?
            .get(0);
        Ok(count as usize)
    }

    fn clear(&self) -> StoreResult<()> {
        self.client()?.execute("DELETE FROM groundwater.readings", &[])?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
