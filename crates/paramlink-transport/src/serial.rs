//! Serial port transport for device communication.
//!
//! Hobby microcontroller boards present as USB-serial adapters
//! (`/dev/ttyUSB0`, `/dev/ttyACM0`, `COM3`) and run the parameter firmware
//! at 9600 baud, 8N1, no flow control.
//!
//! Many such boards wire DTR to the reset line, so opening the port reboots
//! the firmware. [`SerialConfig::reset_on_open`] controls whether that is
//! allowed to happen (the default) or suppressed by de-asserting DTR and RTS
//! right after opening.

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use paramlink_core::error::{Error, Result};
use paramlink_core::transport::Transport;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};

pub use tokio_serial::{DataBits, FlowControl, Parity, StopBits};

/// Line settings for a board's serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
    /// Leave DTR/RTS as the OS sets them on open, which resets most boards.
    /// When `false`, both lines are de-asserted immediately after opening.
    pub reset_on_open: bool,
}

impl Default for SerialConfig {
    /// 9600 8N1, no flow control, reset allowed.
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            reset_on_open: true,
        }
    }
}

/// A board attached through a serial port.
///
/// Dropping the transport releases the port; [`Transport::close`] flushes
/// pending output first.
pub struct SerialTransport {
    stream: Option<SerialStream>,
    path: String,
}

impl SerialTransport {
    /// Open `path` at `baud_rate` with the remaining settings at their
    /// defaults.
    pub async fn open(path: &str, baud_rate: u32) -> Result<Self> {
        Self::open_with_config(
            path,
            SerialConfig {
                baud_rate,
                ..SerialConfig::default()
            },
        )
        .await
    }

    /// Open `path` with explicit line settings.
    ///
    /// ```no_run
    /// # use paramlink_transport::{SerialTransport, SerialConfig};
    /// # async fn example() -> paramlink_core::Result<()> {
    /// let config = SerialConfig {
    ///     baud_rate: 115_200,
    ///     reset_on_open: false,
    ///     ..SerialConfig::default()
    /// };
    /// let transport = SerialTransport::open_with_config("/dev/ttyACM0", config).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn open_with_config(path: &str, config: SerialConfig) -> Result<Self> {
        tracing::debug!(port = %path, ?config, "opening board port");

        let mut stream = tokio_serial::new(path, config.baud_rate)
            .data_bits(config.data_bits)
            .stop_bits(config.stop_bits)
            .parity(config.parity)
            .flow_control(config.flow_control)
            .open_native_async()
            .map_err(|e| {
                tracing::error!(port = %path, error = %e, "cannot open board port");
                Error::Transport(format!("cannot open {path}: {e}"))
            })?;

        if !config.reset_on_open {
            let dtr = stream.write_data_terminal_ready(false);
            let rts = stream.write_request_to_send(false);
            if let Err(e) = dtr.and(rts) {
                tracing::warn!(port = %path, error = %e, "board may reset: could not drop DTR/RTS");
            }
        }

        tracing::info!(port = %path, baud = config.baud_rate, "board port open");
        Ok(Self {
            stream: Some(stream),
            path: path.to_string(),
        })
    }

    /// The device path this transport was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Names of the serial ports present on this machine.
    pub fn available_ports() -> Result<Vec<String>> {
        let ports = tokio_serial::available_ports()
            .map_err(|e| Error::Transport(format!("cannot enumerate serial ports: {e}")))?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }
}

/// An unplugged adapter surfaces as a broken pipe or not-connected error.
fn map_io_error(e: std::io::Error) -> Error {
    match e.kind() {
        ErrorKind::BrokenPipe | ErrorKind::NotConnected => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        tracing::trace!(port = %self.path, bytes = data.len(), "write");

        let written = match stream.write_all(data).await {
            Ok(()) => stream.flush().await,
            Err(e) => Err(e),
        };
        written.map_err(|e| {
            tracing::error!(port = %self.path, error = %e, "write to board failed");
            map_io_error(e)
        })
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let Ok(read) = tokio::time::timeout(timeout, stream.read(buf)).await else {
            return Err(Error::Timeout);
        };
        match read {
            Ok(0) => {
                tracing::warn!(port = %self.path, "board port reached end of stream");
                Err(Error::ConnectionLost)
            }
            Ok(n) => {
                tracing::trace!(port = %self.path, bytes = n, "read");
                Ok(n)
            }
            Err(e) => {
                tracing::error!(port = %self.path, error = %e, "read from board failed");
                Err(map_io_error(e))
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        if let Err(e) = stream.flush().await {
            tracing::warn!(port = %self.path, error = %e, "flush on close failed");
        }
        tracing::info!(port = %self.path, "board port closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}
