//! Control surface.
//!
//! Starts session runs in a background task (one at a time) and relays
//! stop requests through the shared run flag.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::lifecycle::{SessionController, SessionReport};
use crate::state::AppState;
use crate::types::BridgeError;

type RunHandle = JoinHandle<Result<SessionReport, BridgeError>>;

pub struct Supervisor {
    controller: Arc<SessionController>,
    task: Mutex<Option<RunHandle>>,
}

impl Supervisor {
    pub fn new(controller: SessionController) -> Self {
        Self {
            controller: Arc::new(controller),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> &AppState {
        self.controller.state()
    }

    /// Launch a session run. Rejected while a previous run is still alive.
    pub async fn start(&self) -> Result<(), BridgeError> {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(BridgeError::AlreadyRunning);
        }

        self.state().set_running(true);
        let controller = self.controller.clone();
        *task = Some(tokio::spawn(async move {
            let result = controller.run().await;
            if let Err(e) = &result {
                error!(error = %e, "Session run failed");
            }
            result
        }));

        info!("Simulation started");
        Ok(())
    }

    /// Ask the running session to wind down. Always succeeds, also when
    /// nothing is running.
    pub fn stop(&self) {
        self.state().set_running(false);
        info!("Stop signal sent");
    }

    pub async fn is_active(&self) -> bool {
        self.task.lock().await.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for the current run (if any) to finish and return its result.
    pub async fn join(&self) -> Option<Result<SessionReport, BridgeError>> {
        let handle = self.task.lock().await.take()?;
        match handle.await {
            Ok(result) => Some(result),
            Err(e) => {
                error!(error = %e, "Session task panicked");
                None
            }
        }
    }

    /// Stop and wait for teardown. Used on process shutdown.
    pub async fn shutdown(&self) -> Option<Result<SessionReport, BridgeError>> {
        self.stop();
        self.join().await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
