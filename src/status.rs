//! Status surface.
//!
//! Read-only snapshot of the shared state for external observers.

use serde::Serialize;

use crate::config::DATETIME_FORMAT;
use crate::state::SharedState;
use crate::types::{kelvin_to_fahrenheit, HvacMode};

/// Wire shape of the status endpoint.
///
/// `indoorTemp` and `outdoorTemp` are numbers in °F once a session has
/// completed its first step. Before that they serialize as JSON `null`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub indoor_temp: Option<f64>,
    pub outdoor_temp: Option<f64>,
    pub current_date_time: String,
    pub hvac_status: HvacMode,
}

pub async fn snapshot(state: &SharedState) -> StatusSnapshot {
    let readings = state.readings().await;
    let sim_time = state.sim_time().await;

    StatusSnapshot {
        indoor_temp: readings.map(|r| kelvin_to_fahrenheit(r.zone_temp_k)),
        outdoor_temp: readings.map(|r| kelvin_to_fahrenheit(r.ambient_temp_k)),
        current_date_time: sim_time.format(DATETIME_FORMAT).to_string(),
        hvac_status: state.actuators.snapshot().hvac_mode(),
    }
}
