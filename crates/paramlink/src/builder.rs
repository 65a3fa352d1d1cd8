//! EngineBuilder -- fluent builder for constructing [`Engine`] instances.
//!
//! Separates configuration from construction so that callers can set up
//! serial port parameters and timing before the transport is opened.
//!
//! # Example
//!
//! ```no_run
//! use paramlink::EngineBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> paramlink::Result<()> {
//! let engine = EngineBuilder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .baud_rate(9600)
//!     .write_timeout(Duration::from_millis(500))
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use paramlink_core::error::{Error, Result};
use paramlink_core::transport::Transport;
use paramlink_text_io::io::IoConfig;
use paramlink_transport::{SerialConfig, SerialTransport};

use crate::engine::Engine;
use crate::observer::{DEFAULT_LOG_CAPACITY, Observer};

/// How long most boards take to reboot after the port opens.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Fluent builder for [`Engine`].
///
/// ```ignore
/// let engine = EngineBuilder::new()
///     .serial_port("/dev/ttyACM0")
///     .build()
///     .await?;
/// ```
pub struct EngineBuilder {
    serial_port: Option<String>,
    serial_config: SerialConfig,
    poll_interval: Duration,
    write_timeout: Duration,
    /// `None` means: wait [`DEFAULT_SETTLE_DELAY`] after opening a serial
    /// port, and not at all for an injected transport.
    settle_delay: Option<Duration>,
    log_capacity: usize,
    event_capacity: usize,
    channel_capacity: usize,
    observers: Vec<Arc<dyn Observer>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        let io = IoConfig::default();
        EngineBuilder {
            serial_port: None,
            serial_config: SerialConfig::default(),
            poll_interval: io.poll_interval,
            write_timeout: io.write_timeout,
            settle_delay: None,
            log_capacity: DEFAULT_LOG_CAPACITY,
            event_capacity: 256,
            channel_capacity: io.channel_capacity,
            observers: Vec::new(),
        }
    }

    /// Serial port path, e.g. `/dev/ttyUSB0` or `COM3`. Required by
    /// [`build`](Self::build).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.serial_config.baud_rate = baud;
        self
    }

    /// Replace the whole serial configuration (framing, flow control,
    /// reset behaviour).
    pub fn serial_config(mut self, config: SerialConfig) -> Self {
        self.serial_config = config;
        self
    }

    /// Upper bound on one idle read, and the pause after a read error.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Upper bound on writing one command.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Time to wait after the transport is ready before the engine starts.
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = Some(delay);
        self
    }

    /// Lines kept by the operator log.
    pub fn log_capacity(mut self, lines: usize) -> Self {
        self.log_capacity = lines;
        self
    }

    /// Depth of the notification broadcast channel.
    pub fn event_capacity(mut self, depth: usize) -> Self {
        self.event_capacity = depth;
        self
    }

    /// Depth of the dispatcher's command queue.
    pub fn channel_capacity(mut self, depth: usize) -> Self {
        self.channel_capacity = depth;
        self
    }

    /// Register an extra observer alongside the operator log.
    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::Validation("poll_interval must be non-zero".into()));
        }
        if self.write_timeout.is_zero() {
            return Err(Error::Validation("write_timeout must be non-zero".into()));
        }
        if self.log_capacity == 0 || self.event_capacity == 0 || self.channel_capacity == 0 {
            return Err(Error::Validation("capacities must be at least 1".into()));
        }
        Ok(())
    }

    /// Build an [`Engine`] with a caller-provided transport.
    ///
    /// This is the entry point for testing (pass a `MockTransport` from
    /// `paramlink-test-harness`) and for callers that manage the transport
    /// themselves.
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<Engine> {
        self.validate()?;
        let settle = self.settle_delay.unwrap_or(Duration::ZERO);
        self.start(transport, settle).await
    }

    /// Build an [`Engine`] on a serial port.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub async fn build(self) -> Result<Engine> {
        self.validate()?;
        let port = self
            .serial_port
            .as_deref()
            .ok_or_else(|| Error::Validation("serial_port is required for build()".into()))?;

        let transport = SerialTransport::open_with_config(port, self.serial_config.clone()).await?;
        let settle = self.settle_delay.unwrap_or(DEFAULT_SETTLE_DELAY);
        self.start(Box::new(transport), settle).await
    }

    async fn start(self, transport: Box<dyn Transport>, settle: Duration) -> Result<Engine> {
        if !settle.is_zero() {
            tracing::info!(?settle, "waiting for the board to settle");
            tokio::time::sleep(settle).await;
        }

        let io_config = IoConfig {
            poll_interval: self.poll_interval,
            write_timeout: self.write_timeout,
            channel_capacity: self.channel_capacity,
        };
        Ok(Engine::start(
            transport,
            io_config,
            self.log_capacity,
            self.event_capacity,
            self.observers,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paramlink_core::events::Notification;
    use paramlink_test_harness::MockTransport;
    use std::sync::Mutex;

    #[tokio::test]
    async fn builder_defaults() {
        let engine = EngineBuilder::new()
            .build_with_transport(Box::new(MockTransport::new()))
            .await
            .unwrap();
        assert!(engine.store().is_empty());
        assert_eq!(engine.status().software_name(), "Unknown");
    }

    #[tokio::test]
    async fn builder_fluent_chain() {
        let engine = EngineBuilder::new()
            .serial_port("/dev/ttyUSB0")
            .baud_rate(115_200)
            .poll_interval(Duration::from_millis(20))
            .write_timeout(Duration::from_millis(300))
            .settle_delay(Duration::from_millis(1))
            .log_capacity(10)
            .event_capacity(16)
            .channel_capacity(4)
            .build_with_transport(Box::new(MockTransport::new()))
            .await
            .unwrap();
        assert!(engine.log().is_empty());
    }

    #[tokio::test]
    async fn builder_serial_port_required_for_build() {
        let result = EngineBuilder::new().build().await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn builder_rejects_zero_timing() {
        let result = EngineBuilder::new()
            .write_timeout(Duration::ZERO)
            .build_with_transport(Box::new(MockTransport::new()))
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn extra_observers_are_called() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let engine = EngineBuilder::new()
            .observer(Arc::new(move |n: &Notification| {
                sink.lock().unwrap().push(n.to_string());
            }))
            .build_with_transport(Box::new(MockTransport::new()))
            .await
            .unwrap();

        engine.clear_parameters();
        assert_eq!(*seen.lock().unwrap(), vec!["Parameter list cleared."]);
    }
}
