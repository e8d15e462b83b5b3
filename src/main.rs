//! THERMOBRIDGE: real-time co-simulation bridge
//!
//! Entry point. Loads configuration, initialises structured logging, wires
//! the simulation client, serial connector and shared state together, and
//! serves the control/status API until Ctrl+C. Shutdown stops any running
//! session and waits for its teardown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use thermobridge::api;
use thermobridge::config::AppConfig;
use thermobridge::device::SerialConnector;
use thermobridge::engine::{SessionController, Supervisor};
use thermobridge::simulation::BoptestClient;
use thermobridge::state::SharedState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = Arc::new(AppConfig::load(&AppConfig::path_from_env())?);

    init_logging();

    info!(
        base_url = %cfg.simulation.base_url,
        testcase_id = %cfg.simulation.testcase_id,
        step_secs = cfg.simulation.step_secs,
        time_scale = cfg.simulation.time_scale,
        serial_port = %cfg.serial.port,
        baud_rate = cfg.serial.baud_rate,
        "THERMOBRIDGE starting up"
    );

    // -- Initialise components -------------------------------------------

    let sim = BoptestClient::new(
        &cfg.simulation.base_url,
        Duration::from_secs(cfg.simulation.request_timeout_secs),
    )?;
    let connector = SerialConnector::new(cfg.serial.port.clone(), cfg.serial.baud_rate);
    let state = Arc::new(SharedState::new(cfg.simulation.start_datetime()?));

    let supervisor = Arc::new(Supervisor::new(SessionController::new(
        cfg.clone(),
        Arc::new(sim),
        Arc::new(connector),
        state,
    )));

    // -- Serve until Ctrl+C ----------------------------------------------

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received.");
    };
    api::serve(supervisor.clone(), cfg.api.port, shutdown).await?;

    if let Some(Ok(report)) = supervisor.shutdown().await {
        info!(
            run_id = %report.run_id,
            ticks = report.ticks,
            exit = %report.exit,
            "Final session report"
        );
    }
    info!("THERMOBRIDGE shut down cleanly.");

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("thermobridge=info"));

    let json_logging = std::env::var("THERMOBRIDGE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
