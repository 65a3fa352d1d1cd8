//! Transport trait for device communication.
//!
//! The [`Transport`] trait abstracts over the physical link to the
//! microcontroller. The production implementation is a serial port
//! (`paramlink-transport`); tests use the mock transports from
//! `paramlink-test-harness`.
//!
//! The IO task in `paramlink-text-io` is the only owner of a `Transport`
//! once the engine is running. Every read and write it issues is bounded
//! by a timeout, so no operation on this trait is expected to block
//! indefinitely.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to the device.
///
/// Implementations handle buffering and error recovery at the physical
/// layer. Line framing and message decoding are handled by the protocol
/// engine that consumes this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the device.
    ///
    /// Implementations should not return until all bytes have been handed
    /// to the underlying link (serial TX buffer flushed, etc.).
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the device into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Waits up to `timeout` for
    /// data to arrive and returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if nothing is available by then. This is the "bytes available /
    /// read" primitive: a timeout simply means no data.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
