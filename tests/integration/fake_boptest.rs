//! Fake BOPTEST server and in-memory device link for integration testing.
//!
//! The server speaks the same REST shapes as the real one and records
//! every request so tests can assert on what the bridge sent.

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::DuplexStream;

use thermobridge::config::AppConfig;
use thermobridge::device::{DeviceChannel, DeviceConnector, DeviceLink};
use thermobridge::state::AppState;
use thermobridge::types::BridgeError;

pub const TESTCASE_ID: &str = "31383";
pub const SESSION_ID: &str = "fake-session-1";

/// Behaviour knobs and request log for the fake server.
#[derive(Default)]
pub struct FakeBoptest {
    /// 1-based advance call that answers HTTP 500.
    pub fail_advance_at: Option<u64>,
    /// Answer advances with a payload lacking the readings.
    pub malformed_advance: bool,
    pub zone_temp_k: f64,
    pub selects: AtomicU64,
    pub advances: AtomicU64,
    pub stops: AtomicU64,
    pub kpi_requests: AtomicU64,
    pub initialize_bodies: Mutex<Vec<Value>>,
    pub step_bodies: Mutex<Vec<Value>>,
    pub advance_bodies: Mutex<Vec<Value>>,
}

impl FakeBoptest {
    pub fn new() -> Self {
        Self { zone_temp_k: 295.15, ..Default::default() }
    }

    /// Serve on an ephemeral loopback port.
    pub async fn spawn(self) -> (Arc<Self>, SocketAddr) {
        let fake = Arc::new(self);
        let app = Router::new()
            .route("/testcases/:id/select", post(select))
            .route("/initialize/:sid", put(initialize))
            .route("/step/:sid", put(step))
            .route("/advance/:sid", post(advance))
            .route("/kpi/:sid", get(kpi))
            .route("/stop/:sid", put(stop))
            .with_state(fake.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (fake, addr)
    }

    pub fn count(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::SeqCst)
    }
}

type Fake = State<Arc<FakeBoptest>>;

async fn select(State(fake): Fake, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    fake.selects.fetch_add(1, Ordering::SeqCst);
    if id != TESTCASE_ID {
        return (StatusCode::NOT_FOUND, Json(json!({"message": "unknown test case"})));
    }
    (StatusCode::OK, Json(json!({"testid": SESSION_ID})))
}

async fn initialize(State(fake): Fake, Json(body): Json<Value>) -> Json<Value> {
    fake.initialize_bodies.lock().unwrap().push(body);
    Json(json!({"payload": {"read_TRoomTemp_y": fake.zone_temp_k, "time": 46800.0}}))
}

async fn step(State(fake): Fake, Json(body): Json<Value>) -> Json<Value> {
    fake.step_bodies.lock().unwrap().push(body.clone());
    Json(json!({"payload": body}))
}

async fn advance(State(fake): Fake, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let n = fake.advances.fetch_add(1, Ordering::SeqCst) + 1;
    fake.advance_bodies.lock().unwrap().push(body);

    if fake.fail_advance_at == Some(n) {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"message": "simulation failed"})));
    }
    if fake.malformed_advance {
        return (StatusCode::OK, Json(json!({"payload": {"time": 0.0}})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "status": 200,
            "payload": {"read_TRoomTemp_y": fake.zone_temp_k, "read_TAmb_y": 273.15}
        })),
    )
}

async fn kpi(State(fake): Fake) -> Json<Value> {
    fake.kpi_requests.fetch_add(1, Ordering::SeqCst);
    Json(json!({"payload": {"tdis_tot": 0.25, "ener_tot": 1.5, "pgas_tot": null}}))
}

async fn stop(State(fake): Fake) -> StatusCode {
    fake.stops.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Device side
// ---------------------------------------------------------------------------

/// Hands out one pre-made in-memory pipe as the "serial port".
pub struct DuplexConnector {
    stream: Mutex<Option<DuplexStream>>,
}

impl DuplexConnector {
    /// Returns the connector and the thermostat's end of the pipe.
    pub fn pair() -> (Self, DuplexStream) {
        let (ours, theirs) = tokio::io::duplex(16 * 1024);
        (Self { stream: Mutex::new(Some(ours)) }, theirs)
    }
}

#[async_trait]
impl DeviceConnector for DuplexConnector {
    async fn connect(&self, state: AppState) -> Result<Box<dyn DeviceLink>, BridgeError> {
        let stream = self.stream.lock().unwrap().take().ok_or_else(|| BridgeError::Connection {
            port: "duplex".into(),
            message: "already taken".into(),
        })?;
        Ok(Box::new(DeviceChannel::from_transport("duplex", stream, state)))
    }
}

/// Config pointing at the fake server.
pub fn config(base_url: &str, testcase_id: &str, time_scale: f64) -> AppConfig {
    AppConfig::from_toml(&format!(
        r#"
        [simulation]
        base_url = "{base_url}"
        testcase_id = "{testcase_id}"
        step_secs = 30
        time_scale = {time_scale:?}
        epoch = "2024-01-01 00:00:00"
        start = "2024-01-01 13:00:00"
        request_timeout_secs = 5

        [serial]
        port = "duplex"
        baud_rate = 115200

        [api]
        port = 0
        "#
    ))
    .unwrap()
}
