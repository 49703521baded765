/// Read-only analytics over stored readings.
///
/// Submodules:
/// - `groupings` — month buckets and latest-reading pairing.
/// - `trend`     — first/last change and statistics over a trailing window.
/// - `regional`  — per-region status counts on each station's latest reading.
/// - `seasonal`  — twelve calendar-month averages.
/// - `snapshot`  — station list with latest reading and status.
///
/// Empty results are errors (`NotFound` / `NoData`), never empty successes.

pub mod groupings;
pub mod regional;
pub mod seasonal;
pub mod snapshot;
pub mod trend;
