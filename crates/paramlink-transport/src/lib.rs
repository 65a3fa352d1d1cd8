//! Transport implementations for paramlink.
//!
//! This crate provides the concrete [`Transport`](paramlink_core::Transport)
//! used to talk to a microcontroller board:
//!
//! - [`SerialTransport`]: USB virtual COM ports and RS-232 serial connections
//!
//! # Example
//!
//! ```no_run
//! use paramlink_transport::SerialTransport;
//! use paramlink_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> paramlink_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyUSB0", 9600).await?;
//!
//! // Ask the board for every parameter it holds.
//! transport.send(b"get:AlladdedParams\n").await?;
//!
//! let mut buf = [0u8; 256];
//! let n = transport.receive(&mut buf, Duration::from_secs(1)).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;

pub use serial::{DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits};
