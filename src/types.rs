//! Core domain types shared across the bridge.
//!
//! Actuator values, simulation readings, loop phases, unit conversions,
//! and the domain error taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// Offset between the Kelvin and Celsius scales.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Convert an absolute temperature to degrees Celsius (device unit).
pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}

/// Convert an absolute temperature to degrees Fahrenheit (display unit).
pub fn kelvin_to_fahrenheit(kelvin: f64) -> f64 {
    kelvin_to_celsius(kelvin) * 9.0 / 5.0 + 32.0
}

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

/// Point-in-time copy of the three thermostat outputs (each 0 or 1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorSnapshot {
    pub fan: u8,
    pub heating: u8,
    pub cooling: u8,
}

impl ActuatorSnapshot {
    /// HVAC mode by strict priority: heat, then cool, then fan.
    pub fn hvac_mode(&self) -> HvacMode {
        if self.heating != 0 {
            HvacMode::Heat
        } else if self.cooling != 0 {
            HvacMode::Cool
        } else if self.fan != 0 {
            HvacMode::Fan
        } else {
            HvacMode::Off
        }
    }
}

/// A decoded thermostat frame. `None` means the key was absent and the
/// corresponding actuator keeps its current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActuatorUpdate {
    pub fan: Option<u8>,
    pub heating: Option<u8>,
    pub cooling: Option<u8>,
}

impl ActuatorUpdate {
    pub fn is_empty(&self) -> bool {
        self.fan.is_none() && self.heating.is_none() && self.cooling.is_none()
    }
}

/// Reported HVAC operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HvacMode {
    Off,
    Heat,
    Cool,
    Fan,
}

impl fmt::Display for HvacMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HvacMode::Off => write!(f, "Off"),
            HvacMode::Heat => write!(f, "Heat"),
            HvacMode::Cool => write!(f, "Cool"),
            HvacMode::Fan => write!(f, "Fan"),
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Server-issued identifier of a running test case instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Physical readings returned by one successful advance (Kelvin).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepReadings {
    pub zone_temp_k: f64,
    pub ambient_temp_k: f64,
}

/// Step-advance loop state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopPhase {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl LoopPhase {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            LoopPhase::Idle => 0,
            LoopPhase::Running => 1,
            LoopPhase::Stopping => 2,
            LoopPhase::Stopped => 3,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => LoopPhase::Running,
            2 => LoopPhase::Stopping,
            3 => LoopPhase::Stopped,
            _ => LoopPhase::Idle,
        }
    }
}

/// Why the step loop left the Running phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopRequested,
    AdvanceFailed,
    DeviceWriteFailed,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopRequested => write!(f, "stop requested"),
            ExitReason::AdvanceFailed => write!(f, "advance failed"),
            ExitReason::DeviceWriteFailed => write!(f, "device write failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Device connection error ({port}): {message}")]
    Connection { port: String, message: String },

    #[error("Test case selection failed: {0}")]
    Selection(String),

    #[error("Session initialisation failed: {0}")]
    Init(String),

    #[error("Advance failed: {0}")]
    Advance(String),

    #[error("Simulation request failed: {0}")]
    Request(String),

    #[error("Device I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Simulation is already running")]
    AlreadyRunning,

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
