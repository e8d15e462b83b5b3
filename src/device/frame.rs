//! Thermostat wire format.
//!
//! Inbound: newline-terminated UTF-8 JSON objects carrying any subset of
//! `input0` (fan), `input1` (heating) and `input2` (cooling), each 0 or 1.
//! Outbound: `{"temperature": <celsius>}`, one object per simulation step.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::types::ActuatorUpdate;

const FAN_KEY: &str = "input0";
const HEATING_KEY: &str = "input1";
const COOLING_KEY: &str = "input2";

/// Longest inbound line kept, newline included. Longer lines are dropped.
pub const MAX_FRAME_BYTES: usize = 1024;

/// Result of decoding one inbound line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Applied(ActuatorUpdate),
    Discarded(DiscardReason),
}

/// Why a frame was dropped. Noise on the line is expected, so none of
/// these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    InvalidUtf8,
    InvalidJson,
    NotAnObject,
    NoRecognisedKeys,
    TooLong,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscardReason::InvalidUtf8 => write!(f, "invalid utf-8"),
            DiscardReason::InvalidJson => write!(f, "invalid json"),
            DiscardReason::NotAnObject => write!(f, "not a json object"),
            DiscardReason::NoRecognisedKeys => write!(f, "no recognised keys"),
            DiscardReason::TooLong => write!(f, "frame exceeds {MAX_FRAME_BYTES} bytes"),
        }
    }
}

/// Decode one raw line (terminator included or not).
pub fn decode_frame(raw: &[u8]) -> FrameOutcome {
    let Ok(text) = std::str::from_utf8(raw) else {
        return FrameOutcome::Discarded(DiscardReason::InvalidUtf8);
    };

    let value: Value = match serde_json::from_str(text.trim_end()) {
        Ok(v) => v,
        Err(_) => return FrameOutcome::Discarded(DiscardReason::InvalidJson),
    };

    let Some(obj) = value.as_object() else {
        return FrameOutcome::Discarded(DiscardReason::NotAnObject);
    };

    let update = ActuatorUpdate {
        fan: obj.get(FAN_KEY).and_then(binary_value),
        heating: obj.get(HEATING_KEY).and_then(binary_value),
        cooling: obj.get(COOLING_KEY).and_then(binary_value),
    };

    if update.is_empty() {
        FrameOutcome::Discarded(DiscardReason::NoRecognisedKeys)
    } else {
        FrameOutcome::Applied(update)
    }
}

/// Accepts 0/1 (and JSON booleans). Anything else leaves the field alone.
fn binary_value(v: &Value) -> Option<u8> {
    match v {
        Value::Number(n) => match n.as_u64() {
            Some(0) => Some(0),
            Some(1) => Some(1),
            _ => None,
        },
        Value::Bool(b) => Some(u8::from(*b)),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
struct TemperatureFrame {
    temperature: f64,
}

/// Encode the outbound temperature frame (degrees Celsius).
pub fn encode_temperature(celsius: f64) -> std::io::Result<Vec<u8>> {
    Ok(serde_json::to_vec(&TemperatureFrame { temperature: celsius })?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
