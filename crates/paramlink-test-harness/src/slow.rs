//! A deliberately slow transport for contention tests.
//!
//! [`SlowTransport`] writes every byte of a `send()` separately into a shared
//! capture buffer, sleeping between bytes. If two writers ever reached the
//! transport at the same time their bytes would interleave in the capture,
//! so tests can assert that each captured line is an intact command.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use paramlink_core::error::{Error, Result};
use paramlink_core::transport::Transport;

/// A write-only [`Transport`] that trickles bytes out one at a time.
#[derive(Debug, Clone)]
pub struct SlowTransport {
    per_byte: Duration,
    captured: Arc<Mutex<Vec<u8>>>,
    connected: bool,
}

impl SlowTransport {
    /// Create a transport that pauses `per_byte` after every byte written.
    pub fn new(per_byte: Duration) -> Self {
        SlowTransport {
            per_byte,
            captured: Arc::new(Mutex::new(Vec::new())),
            connected: true,
        }
    }

    /// Everything written so far, in arrival order.
    pub fn captured(&self) -> Vec<u8> {
        self.captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The captured bytes split into newline-terminated lines.
    pub fn captured_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.captured())
            .split_terminator('\n')
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl Transport for SlowTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        for &byte in data {
            self.captured
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(byte);
            tokio::time::sleep(self.per_byte).await;
        }
        Ok(())
    }

    async fn receive(&mut self, _buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        tokio::time::sleep(timeout).await;
        Err(Error::Timeout)
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
