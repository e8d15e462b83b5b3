//! Configuration loading from TOML.
//!
//! Reads `config.toml` (or the file named by `THERMOBRIDGE_CONFIG`) into
//! strongly-typed structs. The result is validated once at startup and
//! then shared immutably.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::types::BridgeError;

/// Default config file path.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Environment variable overriding the config path.
pub const CONFIG_PATH_ENV: &str = "THERMOBRIDGE_CONFIG";

/// Timestamp layout used for `epoch`, `start` and the status surface.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub simulation: SimulationConfig,
    pub serial: SerialConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    /// Base URL of the simulation server, e.g. `http://172.17.0.1`.
    pub base_url: String,
    pub testcase_id: String,
    /// Simulated seconds per step.
    pub step_secs: u64,
    /// Simulated seconds per real second.
    pub time_scale: f64,
    /// Zero point of the server's time axis.
    pub epoch: String,
    /// Simulated start timestamp.
    pub start: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub port: u16,
}

fn default_request_timeout() -> u64 {
    30
}

impl AppConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Path of the config file, honouring the environment override.
    pub fn path_from_env() -> String {
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Reject values the step loop cannot run with.
    pub fn validate(&self) -> Result<(), BridgeError> {
        let sim = &self.simulation;
        if sim.step_secs == 0 {
            return Err(BridgeError::Config("step_secs must be positive".into()));
        }
        if !sim.time_scale.is_finite() || sim.time_scale <= 0.0 {
            return Err(BridgeError::Config(format!(
                "time_scale must be a positive number, got {}",
                sim.time_scale
            )));
        }
        sim.tick_interval()?;
        if sim.request_timeout_secs == 0 {
            return Err(BridgeError::Config("request_timeout_secs must be positive".into()));
        }
        let epoch = parse_datetime("epoch", &sim.epoch)?;
        let start = parse_datetime("start", &sim.start)?;
        if start < epoch {
            return Err(BridgeError::Config(format!(
                "start ({}) is before epoch ({})",
                sim.start, sim.epoch
            )));
        }
        Ok(())
    }
}

impl SimulationConfig {
    /// Real time between ticks: step duration divided by the time scale.
    pub fn tick_interval(&self) -> Result<Duration, BridgeError> {
        let secs = self.step_secs as f64 / self.time_scale;
        match Duration::try_from_secs_f64(secs) {
            Ok(interval) if !interval.is_zero() => Ok(interval),
            _ => Err(BridgeError::Config(format!(
                "step_secs {} at time_scale {} gives no usable tick interval",
                self.step_secs, self.time_scale
            ))),
        }
    }

    pub fn epoch_datetime(&self) -> Result<NaiveDateTime, BridgeError> {
        parse_datetime("epoch", &self.epoch)
    }

    pub fn start_datetime(&self) -> Result<NaiveDateTime, BridgeError> {
        parse_datetime("start", &self.start)
    }

    /// Start time as seconds after the epoch, as the server expects it.
    pub fn start_offset_secs(&self) -> Result<u64, BridgeError> {
        let offset = (self.start_datetime()? - self.epoch_datetime()?).num_seconds();
        u64::try_from(offset)
            .map_err(|_| BridgeError::Config("start is before epoch".into()))
    }
}

fn parse_datetime(field: &str, value: &str) -> Result<NaiveDateTime, BridgeError> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT).map_err(|e| {
        BridgeError::Config(format!("{field} '{value}' is not {DATETIME_FORMAT}: {e}"))
    })
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig::from_toml(
        r#"
        [simulation]
        base_url = "http://127.0.0.1:9"
        testcase_id = "31383"
        step_secs = 30
        time_scale = 15.0
        epoch = "2024-01-01 00:00:00"
        start = "2024-01-01 13:00:00"

        [serial]
        port = "/tmp/virtual-serial"
        baud_rate = 115200

        [api]
        port = 5000
        "#,
    )
    .unwrap()
}
