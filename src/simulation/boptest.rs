//! BOPTEST HTTP client.
//!
//! Implements `SimulationApi` against a BOPTEST-style REST server:
//! `testcases/{id}/select`, `initialize`, `step`, `advance`, `kpi` and
//! `stop`, each addressed by the session id returned from selection.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{OverwriteCommands, SimulationApi};
use crate::types::{BridgeError, SessionId, StepReadings};

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SelectResponse {
    testid: String,
}

#[derive(Debug, Serialize)]
struct InitializeRequest {
    start_time: u64,
    warmup_period: u64,
}

#[derive(Debug, Serialize)]
struct StepRequest {
    step: u64,
}

/// Envelope used by `initialize`, `advance` and `kpi` responses.
#[derive(Debug, Deserialize)]
struct PayloadResponse<T> {
    payload: T,
}

#[derive(Debug, Deserialize)]
struct AdvancePayload {
    #[serde(rename = "read_TRoomTemp_y")]
    zone_temp: f64,
    #[serde(rename = "read_TAmb_y")]
    ambient_temp: f64,
}

impl AdvancePayload {
    fn into_readings(self) -> Result<StepReadings, BridgeError> {
        let readings = [
            ("read_TRoomTemp_y", self.zone_temp),
            ("read_TAmb_y", self.ambient_temp),
        ];
        for (name, value) in readings {
            if !value.is_finite() || value < 0.0 {
                return Err(BridgeError::Advance(format!(
                    "{name} is not an absolute temperature: {value}"
                )));
            }
        }
        Ok(StepReadings {
            zone_temp_k: self.zone_temp,
            ambient_temp_k: self.ambient_temp,
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct BoptestClient {
    http: Client,
    base_url: String,
}

impl BoptestClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("THERMOBRIDGE/0.1.0")
            .build()
            .context("Failed to build simulation HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, operation: &str, id: &str) -> String {
        format!("{}/{operation}/{}", self.base_url, urlencoding::encode(id))
    }

    /// Fail with the status line and body for non-success responses.
    async fn check(resp: Response) -> Result<Response, String> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(format!("HTTP {status}: {body}"))
    }
}

#[async_trait]
impl SimulationApi for BoptestClient {
    async fn select_testcase(&self, testcase_id: &str) -> Result<SessionId, BridgeError> {
        let url = format!(
            "{}/testcases/{}/select",
            self.base_url,
            urlencoding::encode(testcase_id)
        );

        let resp = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|e| BridgeError::Selection(e.to_string()))?;
        let resp = Self::check(resp).await.map_err(BridgeError::Selection)?;

        let body: SelectResponse = resp
            .json()
            .await
            .map_err(|e| BridgeError::Selection(format!("malformed select response: {e}")))?;

        info!(testcase_id, testid = %body.testid, "Test case selected");
        Ok(SessionId(body.testid))
    }

    async fn initialize(
        &self,
        session: &SessionId,
        start_time: u64,
        warmup_period: u64,
    ) -> Result<(), BridgeError> {
        let resp = self
            .http
            .put(self.url("initialize", session.as_str()))
            .json(&InitializeRequest { start_time, warmup_period })
            .send()
            .await
            .map_err(|e| BridgeError::Init(e.to_string()))?;
        let resp = Self::check(resp).await.map_err(BridgeError::Init)?;

        // The initial state is informative only; readings are taken from
        // advance responses.
        if let Ok(body) = resp.json::<PayloadResponse<Map<String, Value>>>().await {
            if let Some(zone) = body.payload.get("read_TRoomTemp_y").and_then(Value::as_f64) {
                debug!(zone_temp_k = zone, "Initial zone temperature");
            }
        }

        info!(%session, start_time, warmup_period, "Session initialised");
        Ok(())
    }

    async fn set_step(&self, session: &SessionId, step_secs: u64) -> Result<(), BridgeError> {
        let resp = self
            .http
            .put(self.url("step", session.as_str()))
            .json(&StepRequest { step: step_secs })
            .send()
            .await
            .map_err(|e| BridgeError::Init(e.to_string()))?;
        Self::check(resp).await.map_err(BridgeError::Init)?;

        info!(%session, step_secs, "Step size configured");
        Ok(())
    }

    async fn advance(
        &self,
        session: &SessionId,
        commands: &OverwriteCommands,
    ) -> Result<StepReadings, BridgeError> {
        debug!(?commands, "Sending overwrite commands");

        let resp = self
            .http
            .post(self.url("advance", session.as_str()))
            .json(commands)
            .send()
            .await
            .map_err(|e| BridgeError::Advance(e.to_string()))?;
        let resp = Self::check(resp).await.map_err(BridgeError::Advance)?;

        let body: PayloadResponse<AdvancePayload> = resp
            .json()
            .await
            .map_err(|e| BridgeError::Advance(format!("malformed advance response: {e}")))?;

        body.payload.into_readings()
    }

    async fn kpi(&self, session: &SessionId) -> Result<Map<String, Value>, BridgeError> {
        let resp = self
            .http
            .get(self.url("kpi", session.as_str()))
            .send()
            .await
            .map_err(|e| BridgeError::Request(e.to_string()))?;
        let resp = Self::check(resp).await.map_err(BridgeError::Request)?;

        let body: PayloadResponse<Map<String, Value>> = resp
            .json()
            .await
            .map_err(|e| BridgeError::Request(format!("malformed kpi response: {e}")))?;
        Ok(body.payload)
    }

    async fn stop(&self, session: &SessionId) {
        let result = self.http.put(self.url("stop", session.as_str())).send().await;

        match result {
            Ok(resp) => match Self::check(resp).await {
                Ok(_) => info!(%session, "Session stopped"),
                Err(e) => warn!(%session, error = %e, "Server rejected session stop"),
            },
            Err(e) => warn!(%session, error = %e, "Session stop request failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
