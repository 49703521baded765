//! Live Alert Watcher
//!
//! Terminal stand-in for the dashboard's alert panel:
//! 1. Pull /api/stations-with-status to resynchronize
//! 2. Follow /api/events (Server-Sent Events)
//! 3. Keep the live station map current and log warning/critical readings
//! 4. Ring the terminal bell for each alert, one cue at a time
//!
//! Usage:
//!   cargo run --bin watch_alerts
//!   cargo run --bin watch_alerts -- --url http://host:5000 --token <bearer>

use std::io::{BufRead, BufReader};
use std::time::Instant;

use clap::Parser;
use serde::Deserialize;
use tracing::{debug, info, warn};

use gwmon_service::client::sse::SseParser;
use gwmon_service::client::{AlertCue, CueGate, LiveStationMap, NotificationLog};
use gwmon_service::logging;
use gwmon_service::model::{EVENT_NEW_READING, ReadingEvent, StationWithStatus};

#[derive(Parser)]
#[command(name = "watch_alerts", about = "Follow live groundwater alerts")]
struct Cli {
    /// Base URL of the service.
    #[arg(long, default_value = "http://127.0.0.1:5000")]
    url: String,

    /// Bearer token, if the service requires one.
    #[arg(long, env = "GWMON_TOKEN")]
    token: Option<String>,

    /// Do not ring the terminal bell.
    #[arg(long)]
    quiet: bool,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(false);

    let base = cli.url.trim_end_matches('/');
    let http = reqwest::blocking::Client::builder().timeout(None).build()?;
    let with_auth = |req: reqwest::blocking::RequestBuilder| match &cli.token {
        Some(token) => req.bearer_auth(token),
        None => req,
    };

    let snapshot: Envelope<Vec<StationWithStatus>> = with_auth(http.get(format!("{}/api/stations-with-status", base)))
        .send()?
        .error_for_status()?
        .json()?;
    let mut map = LiveStationMap::from_snapshot(snapshot.data);
    info!(stations = map.len(), "resynchronized from snapshot");

    let stream = with_auth(http.get(format!("{}/api/events", base)))
        .header("Accept", "text/event-stream")
        .send()?
        .error_for_status()?;
    println!("Watching {} for alerts (Ctrl+C to stop)\n", base);

    let mut parser = SseParser::new();
    let mut log = NotificationLog::default();
    let mut gate = CueGate::default();
    let mut stdout = std::io::stdout();

    for line in BufReader::new(stream).lines() {
        let Some(frame) = parser.push_line(&line?) else {
            continue;
        };
        if frame.event != EVENT_NEW_READING {
            debug!(event = %frame.event, "ignoring event");
            continue;
        }
        let event: ReadingEvent = match serde_json::from_str(&frame.data) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "malformed event payload");
                continue;
            }
        };

        if map.apply(&event).is_none() {
            debug!(station = %event.station_id, "event for unknown station or out of order");
        }
        if let Some(notification) = log.record(&event) {
            println!("{}", notification);
            if let Some(cue) = AlertCue::for_status(notification.status) {
                if !cli.quiet && gate.try_play(cue, Instant::now()) {
                    cue.ring(&mut stdout)?;
                }
            }
        }
    }

    info!("event stream closed by server");
    Ok(())
}
