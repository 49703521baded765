/// gwmon_service: DWLR groundwater level monitoring service.
///
/// # Module structure
///
/// ```text
/// gwmon_service
/// ├── model       — shared data types (Station, Reading, ReadingEvent, StatusTier, …)
/// ├── config      — service configuration loader (gwmon.toml)
/// ├── stations    — seed station registry (stations.toml)
/// ├── clock       — injectable wall clock
/// ├── logging     — tracing subscriber setup
/// ├── error       — request-boundary error taxonomy
/// ├── auth        — bearer token verification
/// ├── db          — PostgreSQL connection and schema validation
/// ├── store
/// │   ├── pg      — PostgreSQL station/reading store (schema groundwater)
/// │   └── memory  — in-process store for dev mode and tests
/// ├── alert
/// │   └── thresholds — baseline deviation classification
/// ├── simulator   — synthetic reading generator
/// ├── broadcast   — live fan-out of classified readings
/// ├── seed        — station provisioning and synthetic history
/// ├── analysis
/// │   ├── groupings — month buckets and latest-reading pairing
/// │   ├── trend     — change and statistics over a window
/// │   ├── regional  — per-region status rollup
/// │   ├── seasonal  — calendar-month averages
/// │   └── snapshot  — stations with latest status
/// ├── endpoint    — HTTP API and Server-Sent Events stream
/// ├── daemon      — service assembly and lifecycle
/// └── client      — reference dashboard client state and SSE parser
/// ```

/// Public modules
pub mod alert;
pub mod analysis;
pub mod auth;
pub mod broadcast;
pub mod client;
pub mod clock;
pub mod config;
pub mod daemon;
pub mod db;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod model;
pub mod seed;
pub mod simulator;
pub mod stations;
pub mod store;
