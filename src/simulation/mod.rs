//! Simulation server integration.
//!
//! Defines the `SimulationApi` trait covering the session operations the
//! executive needs, plus the overwrite-command payload sent on every step.
//! `boptest` implements it over HTTP.

pub mod boptest;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::{ActuatorSnapshot, BridgeError, SessionId, StepReadings};

pub use boptest::BoptestClient;

/// Activation flag value for every overwritten input.
const ACTIVATE: &str = "1";

/// Forced actuator values for one step. Field names are the server's
/// input signal names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverwriteCommands {
    #[serde(rename = "overwrite_FurnaceStatus_u")]
    pub furnace_status: String,
    #[serde(rename = "overwrite_FurnaceStatus_activate")]
    pub furnace_activate: String,
    #[serde(rename = "overwrite_ACstatus_u")]
    pub ac_status: String,
    #[serde(rename = "overwrite_ACstatus_activate")]
    pub ac_activate: String,
}

impl OverwriteCommands {
    /// Map thermostat outputs onto the server's inputs. Cooling demand is a
    /// negative AC command: cooling=1 becomes "-1".
    pub fn from_actuators(actuators: &ActuatorSnapshot) -> Self {
        Self {
            furnace_status: actuators.heating.to_string(),
            furnace_activate: ACTIVATE.to_string(),
            ac_status: (-i16::from(actuators.cooling)).to_string(),
            ac_activate: ACTIVATE.to_string(),
        }
    }
}

/// Session operations on a step-based simulation server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SimulationApi: Send + Sync {
    /// Select a test case and obtain a new session id.
    async fn select_testcase(&self, testcase_id: &str) -> Result<SessionId, BridgeError>;

    /// Initialise the session at `start_time` seconds after the epoch.
    async fn initialize(
        &self,
        session: &SessionId,
        start_time: u64,
        warmup_period: u64,
    ) -> Result<(), BridgeError>;

    /// Configure the simulated seconds advanced per step.
    async fn set_step(&self, session: &SessionId, step_secs: u64) -> Result<(), BridgeError>;

    /// Advance one step with the given overwrites.
    async fn advance(
        &self,
        session: &SessionId,
        commands: &OverwriteCommands,
    ) -> Result<StepReadings, BridgeError>;

    /// Key performance indicators accumulated so far.
    async fn kpi(&self, session: &SessionId) -> Result<Map<String, Value>, BridgeError>;

    /// Release the session. Best-effort: failures are logged, never returned.
    async fn stop(&self, session: &SessionId);
}
