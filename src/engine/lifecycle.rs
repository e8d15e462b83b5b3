//! Session lifecycle controller.
//!
//! Sequences one co-simulation run: open device → select test case →
//! initialise → set step → step loop. Whatever happens after the device is
//! open, teardown runs before `run` returns: KPIs are captured and the
//! session stopped if one was obtained, then the device is closed.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::pacer::SimClock;
use super::stepper::StepLoop;
use crate::config::AppConfig;
use crate::device::{DeviceConnector, DeviceLink};
use crate::simulation::SimulationApi;
use crate::state::AppState;
use crate::types::{BridgeError, ExitReason, LoopPhase, SessionId};

/// Outcome of a run that got past session setup.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub run_id: Uuid,
    pub session: Option<SessionId>,
    pub ticks: u64,
    pub exit: ExitReason,
}

pub struct SessionController {
    config: Arc<AppConfig>,
    sim: Arc<dyn SimulationApi>,
    connector: Arc<dyn DeviceConnector>,
    state: AppState,
}

impl SessionController {
    pub fn new(
        config: Arc<AppConfig>,
        sim: Arc<dyn SimulationApi>,
        connector: Arc<dyn DeviceConnector>,
        state: AppState,
    ) -> Self {
        Self { config, sim, connector, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run one full session. Setup failures are returned after teardown.
    pub async fn run(&self) -> Result<SessionReport, BridgeError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("session", %run_id);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<SessionReport, BridgeError> {
        let sim_cfg = &self.config.simulation;
        let start = sim_cfg.start_datetime()?;
        self.state.begin_run(run_id, start).await;

        info!(port = %self.config.serial.port, "Opening device channel");
        let device = match self.connector.connect(self.state.clone()).await {
            Ok(d) => d,
            Err(e) => {
                error!(error = %e, "Could not open device channel");
                self.finish();
                return Err(e);
            }
        };

        let mut session = None;
        let outcome = self.negotiate_and_run(&*device, &mut session).await;

        self.teardown(session.as_ref(), &*device, outcome.is_ok()).await;
        self.finish();

        let exit = outcome.map_err(|e| {
            error!(error = %e, "Session setup failed");
            e
        })?;

        let report = SessionReport {
            run_id,
            session,
            ticks: self.state.ticks(),
            exit,
        };
        info!(ticks = report.ticks, exit = %report.exit, "Session finished");
        Ok(report)
    }

    async fn negotiate_and_run(
        &self,
        device: &dyn DeviceLink,
        session: &mut Option<SessionId>,
    ) -> Result<ExitReason, BridgeError> {
        let sim_cfg = &self.config.simulation;
        let start = sim_cfg.start_datetime()?;
        let start_offset = sim_cfg.start_offset_secs()?;
        let interval = sim_cfg.tick_interval()?;

        let id = self.sim.select_testcase(&sim_cfg.testcase_id).await?;
        let id: &SessionId = session.insert(id);

        self.sim.initialize(id, start_offset, 0).await?;
        self.sim.set_step(id, sim_cfg.step_secs).await?;

        let step_loop = StepLoop::new(
            &*self.sim,
            device,
            &self.state,
            id,
            SimClock::new(start, start_offset, sim_cfg.step_secs),
            interval,
        );
        Ok(step_loop.run().await)
    }

    /// Best-effort release of everything that was acquired.
    async fn teardown(&self, session: Option<&SessionId>, device: &dyn DeviceLink, ran: bool) {
        if let Some(id) = session {
            if ran {
                match self.sim.kpi(id).await {
                    Ok(kpis) => {
                        info!(count = kpis.len(), "KPIs captured");
                        self.state.set_kpis(kpis).await;
                    }
                    Err(e) => warn!(error = %e, "Failed to capture KPIs"),
                }
            }
            info!(%id, "Stopping test case");
            self.sim.stop(id).await;
        }
        device.close().await;
    }

    fn finish(&self) {
        self.state.set_running(false);
        self.state.set_phase(LoopPhase::Stopped);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
