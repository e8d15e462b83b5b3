//! Serial device channel.
//!
//! Owns the transport to the thermostat. A background reader decodes
//! inbound frames into the shared actuator state for as long as the
//! channel is open; writes go through a separate, lock-guarded half so
//! the reader never blocks them.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_serial::SerialPortBuilderExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::frame::{decode_frame, DiscardReason, FrameOutcome, MAX_FRAME_BYTES};
use super::{DeviceConnector, DeviceLink};
use crate::state::AppState;
use crate::types::BridgeError;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

pub struct DeviceChannel {
    label: String,
    writer: Mutex<Option<BoxedWriter>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl DeviceChannel {
    /// Open a serial port and start the frame reader.
    pub async fn open(port: &str, baud_rate: u32, state: AppState) -> Result<Self, BridgeError> {
        let stream = tokio_serial::new(port, baud_rate)
            .open_native_async()
            .map_err(|e| BridgeError::Connection {
                port: port.to_string(),
                message: e.to_string(),
            })?;

        info!(port, baud_rate, "Serial connection opened");
        Ok(Self::from_transport(port, stream, state))
    }

    /// Wrap any byte transport (serial port, pty, in-memory pipe).
    pub fn from_transport<T>(label: &str, transport: T, state: AppState) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(transport);
        let cancel = CancellationToken::new();
        let reader = tokio::spawn(read_frames(read_half, state, cancel.clone()));

        Self {
            label: label.to_string(),
            writer: Mutex::new(Some(Box::new(write_half))),
            reader: Mutex::new(Some(reader)),
            cancel,
        }
    }
}

#[async_trait]
impl DeviceLink for DeviceChannel {
    async fn write(&self, payload: &[u8]) -> Result<(), BridgeError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "device channel is closed")
        })?;

        writer.write_all(payload).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn close(&self) {
        self.cancel.cancel();

        // Join the reader before dropping the write half so the transport
        // is never released while a read is in flight.
        if let Some(handle) = self.reader.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(device = %self.label, error = %e, "Serial reader task ended abnormally");
            }
        }

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                warn!(device = %self.label, error = %e, "Failed to shut down serial writer");
            }
            info!(device = %self.label, "Serial connection closed");
        }
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Decode newline-terminated frames until cancelled or the transport ends.
pub(crate) async fn read_frames<R>(reader: R, state: AppState, cancel: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::with_capacity(128);

    loop {
        line.clear();
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            r = read_line_bounded(&mut reader, &mut line) => r,
        };

        let outcome = match read {
            Ok(LineRead::Eof) => {
                debug!("Serial transport reached end of stream");
                break;
            }
            Ok(LineRead::TooLong) => FrameOutcome::Discarded(DiscardReason::TooLong),
            Ok(LineRead::Line) => decode_frame(&line),
            Err(e) => {
                warn!(error = %e, "Serial read failed, stopping reader");
                break;
            }
        };

        match outcome {
            FrameOutcome::Applied(update) => {
                state.actuators.apply(&update);
                debug!(
                    fan = ?update.fan,
                    heating = ?update.heating,
                    cooling = ?update.cooling,
                    "Received from thermostat"
                );
            }
            FrameOutcome::Discarded(reason) => {
                state.record_discard();
                debug!(%reason, bytes = line.len(), "Discarded thermostat frame");
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Line,
    TooLong,
    Eof,
}

/// Read up to and including the next `\n` into `line`, keeping at most
/// `MAX_FRAME_BYTES`. Past the cap, bytes are consumed and dropped until
/// the newline so one oversized frame cannot grow the buffer.
async fn read_line_bounded<R>(reader: &mut R, line: &mut Vec<u8>) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let mut overflowed = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(if overflowed {
                LineRead::TooLong
            } else if line.is_empty() {
                LineRead::Eof
            } else {
                LineRead::Line
            });
        }

        let (used, complete) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (i + 1, true),
            None => (available.len(), false),
        };

        if !overflowed {
            if line.len() + used > MAX_FRAME_BYTES {
                overflowed = true;
                line.clear();
            } else {
                line.extend_from_slice(&available[..used]);
            }
        }
        reader.consume(used);

        if complete {
            return Ok(if overflowed { LineRead::TooLong } else { LineRead::Line });
        }
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Opens the configured serial port for each session.
pub struct SerialConnector {
    port: String,
    baud_rate: u32,
}

impl SerialConnector {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self { port: port.into(), baud_rate }
    }
}

#[async_trait]
impl DeviceConnector for SerialConnector {
    async fn connect(&self, state: AppState) -> Result<Box<dyn DeviceLink>, BridgeError> {
        let channel = DeviceChannel::open(&self.port, self.baud_rate, state).await?;
        Ok(Box::new(channel))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
