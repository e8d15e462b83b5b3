//! Thermostat device integration.
//!
//! Defines the `DeviceLink` seam used by the step loop and the
//! `DeviceConnector` used by the session controller to open it.
//! The production implementation is a serial `DeviceChannel`.

pub mod channel;
pub mod frame;

use async_trait::async_trait;

use crate::state::AppState;
use crate::types::BridgeError;

pub use channel::{DeviceChannel, SerialConnector};

/// An open connection to the thermostat.
///
/// Inbound frames are consumed by a background reader owned by the
/// implementation; callers only write and close.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Write one payload to the device.
    async fn write(&self, payload: &[u8]) -> Result<(), BridgeError>;

    /// Stop the reader and release the transport. Idempotent.
    async fn close(&self);
}

/// Opens device links bound to the shared actuator state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn connect(&self, state: AppState) -> Result<Box<dyn DeviceLink>, BridgeError>;
}
