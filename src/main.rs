//! Groundwater Monitoring Service - Main Daemon
//!
//! A server-side daemon that:
//! 1. Provisions DWLR stations and a short reading history
//! 2. Simulates new readings and classifies them against station baselines
//! 3. Pushes classified readings to live dashboard clients (SSE)
//! 4. Serves stations, readings and analytics over HTTP
//!
//! Usage:
//!   cargo run --release                       # PostgreSQL store, gwmon.toml if present
//!   cargo run --release -- --in-memory        # No database, dev mode
//!   cargo run --release -- --port 8080 --log-json
//!
//! Environment:
//!   DATABASE_URL      - PostgreSQL connection string
//!   GWMON_AUTH_SECRET - Token signing secret (unset disables auth)
//!   RUST_LOG          - Log filter

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use gwmon_service::clock::SystemClock;
use gwmon_service::config::ServiceConfig;
use gwmon_service::daemon::{Service, Stores};
use gwmon_service::logging;

#[derive(Parser)]
#[command(name = "gwmon_service", about = "DWLR groundwater monitoring service", version)]
struct Cli {
    /// Configuration file (defaults to ./gwmon.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listening port.
    #[arg(long)]
    port: Option<u16>,

    /// Keep stations and readings in memory instead of PostgreSQL.
    #[arg(long)]
    in_memory: bool,

    /// Do not start the reading simulator.
    #[arg(long)]
    no_simulator: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_json);

    let mut config = match ServiceConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error");
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.no_simulator {
        config.simulator.enabled = false;
    }

    let stores = if cli.in_memory {
        info!("using in-memory store; data is lost on exit");
        Stores::in_memory()
    } else {
        match Stores::postgres() {
            Ok(stores) => stores,
            Err(e) => {
                error!("database setup failed:\n{}", e);
                return ExitCode::FAILURE;
            }
        }
    };

    let service = match Service::start(&config, stores, Arc::new(SystemClock)) {
        Ok(service) => service,
        Err(e) => {
            error!(error = %e, "startup failed");
            return ExitCode::FAILURE;
        }
    };

    info!(port = ?service.port(), "groundwater monitoring service running; press Ctrl+C to stop");
    service.wait();
    ExitCode::SUCCESS
}
