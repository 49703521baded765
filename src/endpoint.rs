/// HTTP endpoint for the groundwater dashboard
///
/// Serves the REST API and the live event stream the dashboard map and
/// charts are built on.
///
/// Endpoints:
/// - GET /api/health - Liveness and live subscriber count
/// - GET /api/stations - All stations (auth)
/// - GET /api/stations/{id} - One station (auth)
/// - GET /api/stations/paginated/all?page&limit - Page of stations (auth)
/// - GET /api/stations-with-status - Resync snapshot: latest reading and status per station
/// - GET /api/readings/{id}?limit&hours - Readings, oldest first (auth)
/// - GET /api/analytics/trends/{id}?days - Trend over a trailing window (auth)
/// - GET /api/analytics/regional?state - Regional status rollup (auth)
/// - GET /api/analytics/seasonal/{id}?years - Monthly averages (auth)
/// - GET /api/whoami - Verified token claims (auth)
/// - GET /api/events - Server-Sent Events stream of `new-reading` events
///
/// Ordinary requests run on a fixed worker pool. Each event-stream client
/// gets a dedicated thread that lives as long as its connection.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Arc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use threadpool::ThreadPool;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{debug, error, info, warn};

use crate::analysis::{regional, seasonal, snapshot, trend};
use crate::auth::{Claims, TokenVerifier};
use crate::broadcast::{Broadcaster, Subscription};
use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{EVENT_NEW_READING, ReadingEvent, ReadingQuery};
use crate::store::{ReadingStore, StationStore, StoreError};

/// Default row cap for `/api/readings/{id}`.
pub const DEFAULT_READINGS_LIMIT: usize = 100;
/// Row cap once an `hours` window is given.
pub const WINDOWED_READINGS_LIMIT: usize = 500;
/// Widest `hours` window accepted by `/api/readings/{id}` (ten years).
pub const MAX_WINDOW_HOURS: u32 = 24 * 3650;
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const MAX_PAGE: usize = 1_000_000;
pub const DEFAULT_TREND_DAYS: u32 = 30;
pub const DEFAULT_SEASONAL_YEARS: u32 = 2;

/// Idle time after which an event stream gets a comment line, so dead
/// connections are noticed even when no readings flow.
pub const SSE_KEEPALIVE: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// Request context
// ---------------------------------------------------------------------------

/// Everything a handler needs, shared by every worker.
pub struct AppContext {
    pub stations: Arc<dyn StationStore>,
    pub readings: Arc<dyn ReadingStore>,
    pub broadcaster: Arc<Broadcaster>,
    pub clock: Arc<dyn Clock>,
    /// `None` disables authentication.
    pub auth: Option<TokenVerifier>,
}

/// A GET request reduced to what routing needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiRequest {
    /// Percent-decoded path segments, e.g. `["api", "stations", "DWLR-0001"]`.
    pub segments: Vec<String>,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
}

impl ApiRequest {
    pub fn parse(url: &str, authorization: Option<String>) -> ServiceResult<Self> {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));

        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(decode)
            .collect::<ServiceResult<Vec<_>>>()?;

        let mut params = HashMap::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            params.insert(decode(&key.replace('+', " "))?, decode(&value.replace('+', " "))?);
        }

        Ok(Self {
            segments,
            query: params,
            authorization,
        })
    }

    fn path(&self) -> Vec<&str> {
        self.segments.iter().map(String::as_str).collect()
    }

    fn param<T: std::str::FromStr>(&self, name: &str) -> ServiceResult<Option<T>> {
        match self.query.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| ServiceError::Validation(format!("query parameter '{}' is not a valid number: {}", name, raw))),
        }
    }

    /// A numeric query parameter within `range`, or `default` when absent.
    fn bounded<T>(&self, name: &str, default: T, range: std::ops::RangeInclusive<T>) -> ServiceResult<T>
    where
        T: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
    {
        let value = self.param(name)?.unwrap_or(default);
        if !range.contains(&value) {
            return Err(ServiceError::Validation(format!(
                "query parameter '{}' must be between {} and {}",
                name,
                range.start(),
                range.end()
            )));
        }
        Ok(value)
    }
}

fn decode(raw: &str) -> ServiceResult<String> {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .map_err(|_| ServiceError::Validation(format!("invalid percent-encoding in '{}'", raw)))
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
}

/// Successful handler output; the envelope is added by `envelope`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub data: Value,
    pub pagination: Option<Pagination>,
}

impl ApiReply {
    fn data<T: Serialize>(value: T) -> ServiceResult<Self> {
        let data = serde_json::to_value(value)
            .map_err(|e| StoreError::Invalid(format!("response not serializable: {}", e)))?;
        Ok(Self { data, pagination: None })
    }
}

fn authorize(ctx: &AppContext, req: &ApiRequest) -> ServiceResult<Option<Claims>> {
    match &ctx.auth {
        None => Ok(None),
        Some(verifier) => Ok(Some(verifier.verify_header(req.authorization.as_deref(), ctx.clock.now())?)),
    }
}

fn station_not_found(id: &str) -> ServiceError {
    ServiceError::NotFound(format!("Station {} not found", id))
}

/// Routes one API request. Everything except the event stream goes
/// through here.
pub fn handle_api(ctx: &AppContext, req: &ApiRequest) -> ServiceResult<ApiReply> {
    let path = req.path();
    match path.as_slice() {
        ["api", "health"] => ApiReply::data(json!({
            "status": "ok",
            "service": "gwmon_service",
            "version": env!("CARGO_PKG_VERSION"),
            "subscribers": ctx.broadcaster.subscriber_count(),
            "time": ctx.clock.now(),
        })),

        ["api", "stations-with-status"] => {
            ApiReply::data(snapshot::stations_with_status(ctx.stations.as_ref(), ctx.readings.as_ref())?)
        }

        ["api", "stations"] => {
            authorize(ctx, req)?;
            ApiReply::data(ctx.stations.find_all()?)
        }

        ["api", "stations", "paginated", "all"] => {
            authorize(ctx, req)?;
            let page = req.bounded("page", 1usize, 1..=MAX_PAGE)?;
            let limit = req.bounded("limit", DEFAULT_PAGE_SIZE, 1..=1000)?;
            let (stations, total) = ctx.stations.find_page(page, limit)?;
            let mut reply = ApiReply::data(stations)?;
            reply.pagination = Some(Pagination {
                page,
                limit,
                total,
                pages: total.div_ceil(limit),
            });
            Ok(reply)
        }

        ["api", "stations", id] => {
            authorize(ctx, req)?;
            let station = ctx.stations.find_by_id(id)?.ok_or_else(|| station_not_found(id))?;
            ApiReply::data(station)
        }

        ["api", "readings", id] => {
            authorize(ctx, req)?;
            let limit = req.bounded("limit", DEFAULT_READINGS_LIMIT, 1..=10_000)?;
            let query = match req.param::<u32>("hours")? {
                Some(hours) if (1..=MAX_WINDOW_HOURS).contains(&hours) => {
                    let since = ctx.clock.now() - ChronoDuration::hours(i64::from(hours));
                    ReadingQuery::since(since).with_limit(WINDOWED_READINGS_LIMIT)
                }
                Some(_) => {
                    return Err(ServiceError::Validation(format!(
                        "query parameter 'hours' must be between 1 and {}",
                        MAX_WINDOW_HOURS
                    )));
                }
                None => ReadingQuery::default().with_limit(limit),
            };
            ApiReply::data(ctx.readings.find_by_station(id, &query)?)
        }

        ["api", "analytics", "trends", id] => {
            authorize(ctx, req)?;
            let days = req.bounded("days", DEFAULT_TREND_DAYS, 1..=3650)?;
            ApiReply::data(trend::station_trend(
                ctx.stations.as_ref(),
                ctx.readings.as_ref(),
                id,
                days,
                ctx.clock.now(),
            )?)
        }

        ["api", "analytics", "regional"] => {
            authorize(ctx, req)?;
            let state = req
                .query
                .get("state")
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ServiceError::Validation("query parameter 'state' is required".into()))?;
            ApiReply::data(regional::regional_rollup(ctx.stations.as_ref(), ctx.readings.as_ref(), state)?)
        }

        ["api", "analytics", "seasonal", id] => {
            authorize(ctx, req)?;
            let years = req.bounded("years", DEFAULT_SEASONAL_YEARS, 1..=50)?;
            ApiReply::data(seasonal::seasonal_pattern(
                ctx.stations.as_ref(),
                ctx.readings.as_ref(),
                id,
                years,
                ctx.clock.now(),
            )?)
        }

        ["api", "whoami"] => match authorize(ctx, req)? {
            Some(claims) => ApiReply::data(json!({ "authEnabled": true, "user": claims })),
            None => ApiReply::data(json!({ "authEnabled": false, "user": null })),
        },

        _ => Err(ServiceError::NotFound("Route not found".into())),
    }
}

/// Wraps a handler result in the `{success, data | error, code}` envelope.
pub fn envelope(result: ServiceResult<ApiReply>) -> (u16, Value) {
    match result {
        Ok(ApiReply { data, pagination }) => {
            let mut body = json!({ "success": true, "data": data });
            if let Some(p) = pagination {
                body["pagination"] = json!(p);
            }
            (200, body)
        }
        Err(e) => (
            e.status_code(),
            json!({ "success": false, "error": e.to_string(), "code": e.code() }),
        ),
    }
}

// ---------------------------------------------------------------------------
// Event stream
// ---------------------------------------------------------------------------

/// One SSE frame for a reading event.
pub fn sse_frame(event: &ReadingEvent) -> String {
    // ReadingEvent holds only strings, numbers, bools and a timestamp.
    let data = serde_json::to_string(event).unwrap_or_default();
    format!("event: {}\ndata: {}\n\n", EVENT_NEW_READING, data)
}

const SSE_HEAD: &str = "HTTP/1.1 200 OK\r\n\
Content-Type: text/event-stream\r\n\
Cache-Control: no-cache\r\n\
Connection: close\r\n\
Access-Control-Allow-Origin: *\r\n\r\n";

/// Streams events to one client until it disconnects or the broadcaster
/// stops.
fn stream_events(mut writer: Box<dyn Write + Send>, subscription: Subscription) {
    let id = subscription.id();
    let opened = writer
        .write_all(SSE_HEAD.as_bytes())
        .and_then(|_| writer.write_all(b": connected\n\n"))
        .and_then(|_| writer.flush());
    if opened.is_err() {
        debug!(subscriber = id, "event stream closed before headers were sent");
        return;
    }

    loop {
        let chunk = match subscription.recv_timeout(SSE_KEEPALIVE) {
            Ok(event) => sse_frame(&event),
            Err(RecvTimeoutError::Timeout) => ": keepalive\n\n".to_string(),
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if writer.write_all(chunk.as_bytes()).and_then(|_| writer.flush()).is_err() {
            break;
        }
    }
    debug!(subscriber = id, "event stream closed");
}

fn open_event_stream(ctx: &AppContext, request: Request) {
    let subscription = match ctx.broadcaster.subscribe() {
        Ok(s) => s,
        Err(e) => {
            debug!(error = %e, "event stream refused");
            let body = json!({ "success": false, "error": e.to_string(), "code": "unavailable" });
            respond(request, json_response(503, &body));
            return;
        }
    };

    let writer = request.into_writer();
    let spawned = thread::Builder::new()
        .name(format!("sse-{}", subscription.id()))
        .spawn(move || stream_events(writer, subscription));
    if let Err(e) = spawned {
        error!(error = %e, "failed to spawn event stream thread");
    }
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("failed to start HTTP server on {addr}: {reason}")]
    Bind { addr: String, reason: String },
}

/// Create HTTP response with JSON body
fn json_response(status_code: u16, json: &Value) -> Response<Cursor<Vec<u8>>> {
    let body = serde_json::to_vec_pretty(json).unwrap_or_default();
    let mut response = Response::from_data(body).with_status_code(StatusCode(status_code));
    for (name, value) in [
        ("Content-Type", "application/json"),
        ("Access-Control-Allow-Origin", "*"),
        ("Access-Control-Allow-Headers", "Authorization, Content-Type"),
        ("Access-Control-Allow-Methods", "GET, OPTIONS"),
    ] {
        if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            response.add_header(header);
        }
    }
    response
}

fn respond(request: Request, response: Response<Cursor<Vec<u8>>>) {
    if let Err(e) = request.respond(response) {
        debug!(error = %e, "failed to send response");
    }
}

fn authorization_header(request: &Request) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Authorization"))
        .map(|h| h.value.as_str().to_string())
}

fn handle_request(ctx: &AppContext, request: Request) {
    let method = request.method().clone();
    let url = request.url().to_string();

    if method == Method::Options {
        respond(request, json_response(200, &json!({})));
        return;
    }

    let result = if method != Method::Get {
        Err(ServiceError::NotFound("Route not found".into()))
    } else {
        ApiRequest::parse(&url, authorization_header(&request)).and_then(|req| handle_api(ctx, &req))
    };

    if let Err(e) = &result {
        match e {
            ServiceError::Unavailable(_) => error!(%method, %url, error = %e, "request failed"),
            _ => warn!(%method, %url, code = e.code(), error = %e, "request rejected"),
        }
    }

    let (status, body) = envelope(result);
    respond(request, json_response(status, &body));
}

fn is_event_stream(request: &Request) -> bool {
    *request.method() == Method::Get && request.url().split('?').next() == Some("/api/events")
}

pub struct EndpointServer {
    server: Arc<Server>,
    ctx: Arc<AppContext>,
    workers: usize,
}

impl EndpointServer {
    /// Binds the listener. Use port 0 for an ephemeral port.
    pub fn bind(addr: &str, ctx: Arc<AppContext>, workers: usize) -> Result<Self, EndpointError> {
        let server = Server::http(addr).map_err(|e| EndpointError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            server: Arc::new(server),
            ctx,
            workers: workers.max(1),
        })
    }

    /// The bound port, once listening on TCP.
    pub fn port(&self) -> Option<u16> {
        self.server.server_addr().to_ip().map(|addr| addr.port())
    }

    /// Accepts requests until `shutdown()` is called on a handle.
    pub fn serve(&self) {
        let pool = ThreadPool::with_name("http-worker".to_string(), self.workers);
        info!(port = ?self.port(), workers = self.workers, "HTTP endpoint listening");

        for request in self.server.incoming_requests() {
            if is_event_stream(&request) {
                open_event_stream(&self.ctx, request);
                continue;
            }
            let ctx = Arc::clone(&self.ctx);
            pool.execute(move || handle_request(&ctx, request));
        }

        pool.join();
        info!("HTTP endpoint stopped");
    }

    /// Serves on a background thread.
    pub fn spawn(self) -> std::io::Result<EndpointHandle> {
        let server = Arc::clone(&self.server);
        let port = self.port();
        let thread = thread::Builder::new()
            .name("http-accept".to_string())
            .spawn(move || self.serve())?;
        Ok(EndpointHandle {
            server,
            port,
            thread: Some(thread),
        })
    }
}

pub struct EndpointHandle {
    server: Arc<Server>,
    port: Option<u16>,
    thread: Option<thread::JoinHandle<()>>,
}

impl EndpointHandle {
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Blocks until the accept loop ends.
    pub fn wait(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("HTTP accept thread panicked");
            }
        }
    }

    /// Stops accepting and waits for in-flight ordinary requests.
    /// Event streams end when the broadcaster stops.
    pub fn shutdown(self) {
        self.server.unblock();
        self.wait();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
