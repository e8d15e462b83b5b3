//! Step-advance loop.
//!
//! Once per tick interval: read the thermostat outputs, push them to the
//! simulation server as overwrite commands, publish the returned readings
//! and send the zone temperature back to the device. Any advance or device
//! failure ends the loop; so does the run flag going false.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};

use super::pacer::{Pacer, SimClock};
use crate::device::frame::encode_temperature;
use crate::device::DeviceLink;
use crate::simulation::{OverwriteCommands, SimulationApi};
use crate::state::SharedState;
use crate::types::{
    kelvin_to_celsius, kelvin_to_fahrenheit, ExitReason, LoopPhase, SessionId,
};

pub struct StepLoop<'a> {
    sim: &'a dyn SimulationApi,
    device: &'a dyn DeviceLink,
    state: &'a SharedState,
    session: &'a SessionId,
    clock: SimClock,
    interval: Duration,
}

impl<'a> StepLoop<'a> {
    pub fn new(
        sim: &'a dyn SimulationApi,
        device: &'a dyn DeviceLink,
        state: &'a SharedState,
        session: &'a SessionId,
        clock: SimClock,
        interval: Duration,
    ) -> Self {
        Self { sim, device, state, session, clock, interval }
    }

    /// Run until stopped or a tick fails. Leaves the phase at `Stopping`;
    /// the caller owns teardown.
    pub async fn run(mut self) -> ExitReason {
        self.state.set_phase(LoopPhase::Running);
        let mut pacer = Pacer::new(self.interval, Instant::now());

        info!(
            interval_ms = self.interval.as_millis() as u64,
            start = %self.clock.now(),
            "Step loop running"
        );

        let reason = loop {
            if !self.state.is_running() {
                break ExitReason::StopRequested;
            }
            if !pacer.poll(Instant::now()) {
                tokio::time::sleep_until(pacer.next_deadline()).await;
                continue;
            }
            if let Err(reason) = self.tick().await {
                break reason;
            }
        };

        self.state.set_phase(LoopPhase::Stopping);
        info!(%reason, steps = self.clock.steps(), "Step loop stopping");
        reason
    }

    async fn tick(&mut self) -> Result<(), ExitReason> {
        let sim_time = self.clock.advance();
        self.state.set_sim_time(sim_time).await;

        let actuators = self.state.actuators.snapshot();
        let commands = OverwriteCommands::from_actuators(&actuators);

        let readings = match self.sim.advance(self.session, &commands).await {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, %sim_time, "Advance failed, ending session");
                return Err(ExitReason::AdvanceFailed);
            }
        };
        self.state.set_readings(readings).await;
        self.state.record_tick();

        let celsius = kelvin_to_celsius(readings.zone_temp_k);
        let written = match encode_temperature(celsius) {
            Ok(payload) => self.device.write(&payload).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            error!(error = %e, "Device write failed, ending session");
            return Err(ExitReason::DeviceWriteFailed);
        }

        debug!(celsius, "Sent to thermostat");
        info!(
            %sim_time,
            sim_offset_secs = self.clock.offset_secs(),
            zone_f = format!("{:.2}", kelvin_to_fahrenheit(readings.zone_temp_k)),
            outdoor_f = format!("{:.2}", kelvin_to_fahrenheit(readings.ambient_temp_k)),
            heating = actuators.heating,
            cooling = actuators.cooling,
            fan = actuators.fan,
            "Step advanced"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
