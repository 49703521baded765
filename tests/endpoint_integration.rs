/// Integration tests for the HTTP endpoint
///
/// Starts a real server on an ephemeral port over the in-memory store and
/// talks to it with a blocking HTTP client, including the live event stream.
///
/// Run with: cargo test --test endpoint_integration

use std::io::{BufRead, BufReader};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use gwmon_service::auth::{Claims, Role, TokenVerifier};
use gwmon_service::broadcast::Broadcaster;
use gwmon_service::client::sse::SseParser;
use gwmon_service::clock::ManualClock;
use gwmon_service::endpoint::{AppContext, EndpointHandle, EndpointServer};
use gwmon_service::model::{EVENT_NEW_READING, GeoPoint, Reading, ReadingEvent, Station};
use gwmon_service::store::{MemoryStore, ReadingStore};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const SECRET: &str = "integration-secret";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn station(id: &str, state: &str, baseline: f64) -> Station {
    Station {
        station_id: id.to_string(),
        name: format!("{} Monitoring Station", id),
        state: state.to_string(),
        district: "District".to_string(),
        location: GeoPoint {
            latitude: 19.07,
            longitude: 72.87,
        },
        baseline_value: baseline,
    }
}

struct TestServer {
    base: String,
    store: Arc<MemoryStore>,
    broadcaster: Arc<Broadcaster>,
    handle: EndpointHandle,
}

impl TestServer {
    fn start(auth: bool) -> Self {
        let store = Arc::new(MemoryStore::with_stations(vec![
            station("DWLR-0001", "Maharashtra", 12.5),
            station("DWLR-0002", "Delhi", 15.2),
        ]));
        let clock = Arc::new(ManualClock::new(now()));
        let broadcaster = Arc::new(Broadcaster::new(16, clock.clone()));
        broadcaster.start();

        let ctx = Arc::new(AppContext {
            stations: store.clone(),
            readings: store.clone(),
            broadcaster: broadcaster.clone(),
            clock,
            auth: auth.then(|| TokenVerifier::new(SECRET)),
        });
        let server = EndpointServer::bind("127.0.0.1:0", ctx, 4).expect("bind ephemeral port");
        let port = server.port().expect("tcp listener has a port");
        let handle = server.spawn().expect("spawn accept thread");

        Self {
            base: format!("http://127.0.0.1:{}", port),
            store,
            broadcaster,
            handle,
        }
    }

    fn get(&self, path: &str, token: Option<&str>) -> (u16, Value) {
        let mut req = reqwest::blocking::Client::new().get(format!("{}{}", self.base, path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().expect("request should complete");
        let status = resp.status().as_u16();
        (status, resp.json().expect("body should be JSON"))
    }

    fn stop(self) {
        self.broadcaster.stop();
        self.handle.shutdown();
    }
}

fn token(exp: DateTime<Utc>) -> String {
    TokenVerifier::new(SECRET).sign(&Claims {
        sub: "user-1".to_string(),
        username: "hydrologist".to_string(),
        role: Role::Researcher,
        exp: exp.timestamp(),
    })
}

// ---------------------------------------------------------------------------
// REST
// ---------------------------------------------------------------------------

#[test]
fn test_health_and_snapshot_are_public() {
    let server = TestServer::start(true);
    server.store.append(&Reading::new("DWLR-0001", 15.5, now())).unwrap();

    let (status, body) = server.get("/api/health", None);
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);

    let (status, body) = server.get("/api/stations-with-status", None);
    assert_eq!(status, 200);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    let mumbai = data.iter().find(|s| s["stationId"] == "DWLR-0001").unwrap();
    assert_eq!(mumbai["latestReading"], 15.5);
    assert_eq!(mumbai["status"], "critical");

    server.stop();
}

#[test]
fn test_protected_routes_reject_missing_and_expired_tokens() {
    let server = TestServer::start(true);

    let (status, body) = server.get("/api/stations", None);
    assert_eq!(status, 401);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "unauthorized");

    let expired = token(now() - chrono::Duration::minutes(1));
    assert_eq!(server.get("/api/stations", Some(&expired)).0, 401);

    let valid = token(now() + chrono::Duration::days(1));
    let (status, body) = server.get("/api/stations", Some(&valid));
    assert_eq!(status, 200);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = server.get("/api/whoami", Some(&valid));
    assert_eq!(body["data"]["user"]["role"], "researcher");

    server.stop();
}

#[test]
fn test_analytics_errors_carry_codes() {
    let server = TestServer::start(false);

    let (status, body) = server.get("/api/analytics/trends/DWLR-0009", None);
    assert_eq!(status, 404);
    assert_eq!(body["code"], "not_found");

    let (status, body) = server.get("/api/analytics/trends/DWLR-0001?days=7", None);
    assert_eq!(status, 404);
    assert_eq!(body["code"], "no_data");

    let (status, body) = server.get("/api/analytics/trends/DWLR-0001?days=-3", None);
    assert_eq!(status, 400);
    assert_eq!(body["code"], "validation");

    server.store.append(&Reading::new("DWLR-0002", 15.2, now() - chrono::Duration::days(2))).unwrap();
    let (status, body) = server.get("/api/analytics/seasonal/DWLR-0002", None);
    assert_eq!(status, 200);
    assert_eq!(body["data"]["seasonalPatterns"].as_array().unwrap().len(), 12);

    server.stop();
}

// ---------------------------------------------------------------------------
// Event stream
// ---------------------------------------------------------------------------

#[test]
fn test_event_stream_delivers_published_readings() {
    let server = TestServer::start(true);

    let stream = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
        .get(format!("{}/api/events", server.base))
        .send()
        .expect("event stream should open without a token");
    assert_eq!(stream.status().as_u16(), 200);
    assert!(
        stream.headers()["content-type"].to_str().unwrap().starts_with("text/event-stream")
    );

    let deadline = Instant::now() + Duration::from_secs(5);
    while server.broadcaster.subscriber_count() == 0 {
        assert!(Instant::now() < deadline, "subscriber never registered");
        thread::sleep(Duration::from_millis(10));
    }

    let published = ReadingEvent {
        station_id: "DWLR-0001".to_string(),
        water_level: 13.9,
        timestamp: now(),
        is_critical: false,
        is_warning: true,
    };
    assert_eq!(server.broadcaster.publish(&published).delivered, 1);

    let mut parser = SseParser::new();
    let mut received = None;
    for line in BufReader::new(stream).lines() {
        if let Some(frame) = parser.push_line(&line.unwrap()) {
            assert_eq!(frame.event, EVENT_NEW_READING);
            received = Some(serde_json::from_str::<ReadingEvent>(&frame.data).unwrap());
            break;
        }
    }
    assert_eq!(received, Some(published));

    server.stop();
}
