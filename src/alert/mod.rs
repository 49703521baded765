/// Threshold evaluation for groundwater readings.
///
/// Submodules:
/// - `thresholds` — percentage-deviation classification into status tiers.

pub mod thresholds;
