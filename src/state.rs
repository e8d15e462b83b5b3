//! Shared runtime state.
//!
//! One `SharedState` is built at startup and handed (as an `Arc`) to the
//! serial reader, the step loop and the HTTP handlers. Actuator fields are
//! individual atomics written by the reader; readings and the simulated
//! timestamp sit behind locks written only by the step loop.

use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::types::{ActuatorSnapshot, ActuatorUpdate, LoopPhase, StepReadings};

pub type AppState = Arc<SharedState>;

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

/// Thermostat outputs, last-write-wins per field.
#[derive(Debug, Default)]
pub struct ActuatorState {
    fan: AtomicU8,
    heating: AtomicU8,
    cooling: AtomicU8,
}

impl ActuatorState {
    /// Apply the keys present in a decoded frame; absent keys are untouched.
    pub fn apply(&self, update: &ActuatorUpdate) {
        if let Some(v) = update.fan {
            self.fan.store(v, Ordering::Release);
        }
        if let Some(v) = update.heating {
            self.heating.store(v, Ordering::Release);
        }
        if let Some(v) = update.cooling {
            self.cooling.store(v, Ordering::Release);
        }
    }

    pub fn snapshot(&self) -> ActuatorSnapshot {
        ActuatorSnapshot {
            fan: self.fan.load(Ordering::Acquire),
            heating: self.heating.load(Ordering::Acquire),
            cooling: self.cooling.load(Ordering::Acquire),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct SharedState {
    pub actuators: ActuatorState,
    readings: RwLock<Option<StepReadings>>,
    sim_time: RwLock<NaiveDateTime>,
    kpis: RwLock<Option<Map<String, Value>>>,
    run_id: RwLock<Option<Uuid>>,
    running: AtomicBool,
    phase: AtomicU8,
    ticks: AtomicU64,
    frames_discarded: AtomicU64,
}

impl SharedState {
    /// Fresh state showing `start` as the simulated time.
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            actuators: ActuatorState::default(),
            readings: RwLock::new(None),
            sim_time: RwLock::new(start),
            kpis: RwLock::new(None),
            run_id: RwLock::new(None),
            running: AtomicBool::new(false),
            phase: AtomicU8::new(LoopPhase::Idle.as_u8()),
            ticks: AtomicU64::new(0),
            frames_discarded: AtomicU64::new(0),
        }
    }

    // -- run flag --

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    // -- loop phase --

    pub fn phase(&self) -> LoopPhase {
        LoopPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn set_phase(&self, phase: LoopPhase) {
        self.phase.store(phase.as_u8(), Ordering::Release);
    }

    // -- counters --

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_discarded(&self) -> u64 {
        self.frames_discarded.load(Ordering::Relaxed)
    }

    pub fn record_discard(&self) {
        self.frames_discarded.fetch_add(1, Ordering::Relaxed);
    }

    // -- readings and clock --

    pub async fn readings(&self) -> Option<StepReadings> {
        *self.readings.read().await
    }

    pub async fn set_readings(&self, readings: StepReadings) {
        *self.readings.write().await = Some(readings);
    }

    pub async fn sim_time(&self) -> NaiveDateTime {
        *self.sim_time.read().await
    }

    pub async fn set_sim_time(&self, at: NaiveDateTime) {
        *self.sim_time.write().await = at;
    }

    // -- session bookkeeping --

    pub async fn kpis(&self) -> Option<Map<String, Value>> {
        self.kpis.read().await.clone()
    }

    pub async fn set_kpis(&self, kpis: Map<String, Value>) {
        *self.kpis.write().await = Some(kpis);
    }

    pub async fn run_id(&self) -> Option<Uuid> {
        *self.run_id.read().await
    }

    /// Reset per-run fields at the start of a new lifecycle run.
    pub async fn begin_run(&self, run_id: Uuid, start: NaiveDateTime) {
        *self.run_id.write().await = Some(run_id);
        *self.readings.write().await = None;
        *self.sim_time.write().await = start;
        self.ticks.store(0, Ordering::Relaxed);
        self.set_phase(LoopPhase::Idle);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
