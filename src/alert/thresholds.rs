//! Baseline deviation threshold checking.
//!
//! A reading is classified by how far it sits above its station's baseline,
//! as a percentage of that baseline. Two fixed steps, no hysteresis: a level
//! oscillating around a boundary flips tier on every observation.

use thiserror::Error;

use crate::model::{Reading, Station, StatusTier};

/// Deviation (percent) above which a reading is a warning.
pub const WARNING_DEVIATION_PERCENT: f64 = 10.0;

/// Deviation (percent) above which a reading is critical.
pub const CRITICAL_DEVIATION_PERCENT: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThresholdError {
    #[error("baseline value must be non-zero")]
    ZeroBaseline,
    #[error("non-finite input: water level {water_level}, baseline {baseline}")]
    NonFinite { water_level: f64, baseline: f64 },
}

/// Percentage deviation of `water_level` from `baseline`.
///
/// Computed as `(level - baseline) * 100 / baseline`, equal to
/// `(level - baseline) / baseline * 100` but exact for decimal boundaries
/// such as 11.0 against 10.0.
pub fn percent_deviation(water_level: f64, baseline: f64) -> Result<f64, ThresholdError> {
    if !water_level.is_finite() || !baseline.is_finite() {
        return Err(ThresholdError::NonFinite { water_level, baseline });
    }
    if baseline == 0.0 {
        return Err(ThresholdError::ZeroBaseline);
    }
    Ok((water_level - baseline) * 100.0 / baseline)
}

/// Maps a percentage deviation onto a status tier.
///
/// Both boundaries are exclusive on the low side: exactly 10 % is normal,
/// exactly 20 % is warning.
pub fn status_for_deviation(percent: f64) -> StatusTier {
    if percent > CRITICAL_DEVIATION_PERCENT {
        StatusTier::Critical
    } else if percent > WARNING_DEVIATION_PERCENT {
        StatusTier::Warning
    } else {
        StatusTier::Normal
    }
}

/// Classifies a water level against a baseline.
pub fn classify(water_level: f64, baseline: f64) -> Result<StatusTier, ThresholdError> {
    percent_deviation(water_level, baseline).map(status_for_deviation)
}

/// Classifies a stored reading against its station's current baseline.
pub fn classify_reading(reading: &Reading, station: &Station) -> Result<StatusTier, ThresholdError> {
    classify(reading.water_level, station.baseline_value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
