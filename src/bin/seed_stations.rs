//! Bulk Station Reseed
//!
//! Replaces the whole station registry and reading history:
//! 1. Load and validate stations from stations.toml
//! 2. Delete every stored reading
//! 3. Replace all stations
//! 4. Generate 48 hours of hourly readings (±2 m around each baseline)
//!
//! Usage:
//!   cargo run --bin seed_stations -- --yes
//!   cargo run --bin seed_stations -- --stations other.toml --yes
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string (from .env)

use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use gwmon_service::config::ServiceConfig;
use gwmon_service::daemon::Stores;
use gwmon_service::{logging, seed, stations};

#[derive(Parser)]
#[command(name = "seed_stations", about = "Replace all stations and readings with seed data")]
struct Cli {
    /// Configuration file (defaults to ./gwmon.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Station registry to load instead of `[seed].stations_file`.
    #[arg(long)]
    stations: Option<PathBuf>,

    /// Confirm that existing stations and readings may be deleted.
    #[arg(long)]
    yes: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(false);

    let config = ServiceConfig::load(cli.config.as_deref())?;
    let path = cli.stations.unwrap_or(config.seed.stations_file.clone());

    let registry = stations::load_stations(&path, &config.region)?;
    println!("✓ Loaded {} stations from {}", registry.len(), path.display());

    if !cli.yes {
        eprintln!("This deletes every stored station and reading. Re-run with --yes to proceed.");
        std::process::exit(2);
    }

    let stores = Stores::postgres().unwrap_or_else(|e| {
        eprintln!("\n{}\n", e);
        std::process::exit(1);
    });
    info!("connected to database");

    let mut rng = StdRng::from_entropy();
    let summary = seed::reseed(
        stores.stations.as_ref(),
        stores.readings.as_ref(),
        &registry,
        Utc::now(),
        &mut rng,
    )?;

    println!("✓ Stations written: {}", summary.stations);
    println!("✓ Readings written: {}", summary.readings);
    Ok(())
}
