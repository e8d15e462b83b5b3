//! HTTP route handlers for status and control.
//!
//! All endpoints return JSON. State is shared via `Arc<Supervisor>`.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::engine::Supervisor;
use crate::status::{self, StatusSnapshot};
use crate::types::{ActuatorSnapshot, BridgeError, LoopPhase};

pub type ApiState = Arc<Supervisor>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self { message: message.into() })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub run_id: Option<Uuid>,
    pub phase: LoopPhase,
    pub running: bool,
    pub ticks: u64,
    pub frames_discarded: u64,
    pub actuators: ActuatorSnapshot,
}

/// KPIs captured at the end of the last session that reached the loop.
#[derive(Debug, Clone, Serialize)]
pub struct KpiResponse {
    pub kpi: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /sim_data
pub async fn get_sim_data(State(sup): State<ApiState>) -> Json<StatusSnapshot> {
    Json(status::snapshot(sup.state()).await)
}

/// POST /api/start_simulation
pub async fn start_simulation(
    State(sup): State<ApiState>,
) -> (StatusCode, Json<MessageResponse>) {
    match sup.start().await {
        Ok(()) => (StatusCode::OK, MessageResponse::new("Simulation started")),
        Err(BridgeError::AlreadyRunning) => (
            StatusCode::CONFLICT,
            MessageResponse::new("Simulation is already running"),
        ),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, MessageResponse::new(e.to_string())),
    }
}

/// POST /api/stop_simulation
pub async fn stop_simulation(State(sup): State<ApiState>) -> Json<MessageResponse> {
    sup.stop();
    MessageResponse::new("Stop signal sent")
}

/// GET /api/session
pub async fn get_session(State(sup): State<ApiState>) -> Json<SessionResponse> {
    let state = sup.state();
    Json(SessionResponse {
        run_id: state.run_id().await,
        phase: state.phase(),
        running: state.is_running(),
        ticks: state.ticks(),
        frames_discarded: state.frames_discarded(),
        actuators: state.actuators.snapshot(),
    })
}

/// GET /kpi
pub async fn get_kpi(State(sup): State<ApiState>) -> Result<Json<KpiResponse>, StatusCode> {
    let kpi = sup.state().kpis().await.ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(KpiResponse { kpi }))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
