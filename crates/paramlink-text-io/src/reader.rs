//! Line reader for the IO task's idle arm.
//!
//! [`LineReader`] polls the transport with a bounded receive and yields one
//! complete line at a time. It never ends on its own: timeouts are silent,
//! and read errors are logged and followed by a pause of one poll interval
//! before reading again.

use std::time::Duration;

use paramlink_core::error::Error;
use paramlink_core::transport::Transport;

use crate::protocol::LineBuffer;

const CHUNK: usize = 256;

/// Reads trimmed, non-empty lines from a transport.
///
/// Partial lines live in the reader's own buffer, not in the future returned
/// by [`next_line`](LineReader::next_line), so dropping that future (as
/// `tokio::select!` does when another arm wins) loses no data.
#[derive(Debug)]
pub struct LineReader {
    buffer: LineBuffer,
    poll_interval: Duration,
    consecutive_errors: u32,
}

impl LineReader {
    pub fn new(poll_interval: Duration) -> Self {
        LineReader {
            buffer: LineBuffer::new(),
            poll_interval,
            consecutive_errors: 0,
        }
    }

    /// Wait for the next complete line.
    pub async fn next_line(&mut self, transport: &mut dyn Transport) -> String {
        loop {
            if let Some(line) = self.buffer.next_line() {
                return line;
            }

            let mut chunk = [0u8; CHUNK];
            match transport.receive(&mut chunk, self.poll_interval).await {
                Ok(0) => tokio::time::sleep(self.poll_interval).await,
                Ok(n) => {
                    if self.consecutive_errors > 0 {
                        tracing::info!(
                            after = self.consecutive_errors,
                            "transport readable again"
                        );
                        self.consecutive_errors = 0;
                    }
                    self.buffer.extend(&chunk[..n]);
                }
                Err(Error::Timeout) => {}
                Err(e) => {
                    if self.consecutive_errors == 0 {
                        tracing::warn!(error = %e, "error reading from transport");
                    } else {
                        tracing::debug!(error = %e, count = self.consecutive_errors, "read still failing");
                    }
                    self.consecutive_errors = self.consecutive_errors.saturating_add(1);
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}
