//! Mock transport for deterministic testing of the protocol engine.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs. When the engine writes a command that matches
//! the next expectation, the scripted reply lines become readable. Lines the
//! board would push on its own (encoder turns, button presses) can be
//! injected at any time with [`MockTransport::push_inbound`].
//!
//! State is shared between clones, so a test can keep one handle while the
//! other is moved into the engine's IO task.
//!
//! # Example
//!
//! ```
//! use paramlink_test_harness::MockTransport;
//!
//! let mock = MockTransport::new();
//! // When the engine sends this command, reply with one listing row.
//! mock.expect(b"get:AlladdedParams\n", b"L,0,gain,0,10,5\n");
//! let handle = mock.clone();
//! assert_eq!(handle.remaining_expectations(), 1);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;

use paramlink_core::error::{Error, Result};
use paramlink_core::transport::Transport;

/// A pre-loaded request/response pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes that become readable once the request is seen.
    response: Vec<u8>,
}

#[derive(Debug)]
struct MockState {
    /// Ordered queue of expected request/response pairs.
    expectations: VecDeque<Expectation>,
    /// Bytes waiting to be returned by `receive()`.
    inbound: VecDeque<u8>,
    /// Whether the transport is "connected".
    connected: bool,
    /// Log of all bytes sent through this transport.
    sent_log: Vec<Vec<u8>>,
    /// When set, sends with no matching expectation are recorded and
    /// accepted instead of failing.
    lenient: bool,
}

/// A mock [`Transport`] for testing without hardware.
///
/// Expectations are consumed in order. A `send()` whose bytes do not match
/// the next expectation fails with [`Error::Transport`], unless the mock
/// was made [`lenient`](MockTransport::lenient).
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    data_ready: Arc<Notify>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            state: Arc::new(Mutex::new(MockState {
                expectations: VecDeque::new(),
                inbound: VecDeque::new(),
                connected: true,
                sent_log: Vec::new(),
                lenient: false,
            })),
            data_ready: Arc::new(Notify::new()),
        }
    }

    /// Create a mock that accepts any write, recording it.
    ///
    /// Scripted expectations still apply when present.
    pub fn lenient() -> Self {
        let mock = Self::new();
        mock.lock().lenient = true;
        mock
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an expected request/response pair.
    ///
    /// When `send()` is called with data matching `request`, `response`
    /// becomes readable through `receive()`.
    pub fn expect(&self, request: &[u8], response: &[u8]) {
        self.lock().expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Make `data` readable as if the board had sent it unprompted.
    pub fn push_inbound(&self, data: &[u8]) {
        self.lock().inbound.extend(data.iter().copied());
        self.data_ready.notify_one();
    }

    /// Return a copy of all data that has been sent through this transport.
    ///
    /// Each element is the byte slice from one `send()` call.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.lock().sent_log.clone()
    }

    /// Return the sent writes decoded as text, with the trailing newline
    /// removed.
    pub fn sent_lines(&self) -> Vec<String> {
        self.lock()
            .sent_log
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).trim_end_matches('\n').to_string())
            .collect()
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.lock().expectations.len()
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent `send()` and `receive()` calls will
    /// return [`Error::NotConnected`].
    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
        self.data_ready.notify_one();
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.lock();
        if !state.connected {
            return Err(Error::NotConnected);
        }

        state.sent_log.push(data.to_vec());

        let matches_next = state
            .expectations
            .front()
            .is_some_and(|e| e.request.as_slice() == data);

        if matches_next {
            if let Some(expectation) = state.expectations.pop_front() {
                state.inbound.extend(expectation.response);
            }
            drop(state);
            self.data_ready.notify_one();
            return Ok(());
        }

        if state.lenient {
            return Ok(());
        }

        match state.expectations.front() {
            Some(expectation) => Err(Error::Transport(format!(
                "unexpected send data: expected {:?}, got {:?}",
                String::from_utf8_lossy(&expectation.request),
                String::from_utf8_lossy(data)
            ))),
            None => Err(Error::Transport(
                "no more expectations in mock transport".into(),
            )),
        }
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut state = self.lock();
                if !state.connected {
                    return Err(Error::NotConnected);
                }
                if !state.inbound.is_empty() {
                    let n = state.inbound.len().min(buf.len());
                    for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
                        *slot = byte;
                    }
                    return Ok(n);
                }
            }

            if tokio::time::timeout_at(deadline, self.data_ready.notified())
                .await
                .is_err()
            {
                return Err(Error::Timeout);
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.connected = false;
        state.inbound.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_transport_basic_send_receive() {
        let mut mock = MockTransport::new();
        mock.expect(b"get:paramCurval,gain\n", b"G,gain,5\n");

        mock.send(b"get:paramCurval,gain\n").await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"G,gain,5\n");
    }

    #[tokio::test]
    async fn mock_transport_tracks_sent_data() {
        let mut mock = MockTransport::new();
        mock.expect(b"a\n", b"");
        mock.expect(b"b\n", b"");

        mock.send(b"a\n").await.unwrap();
        mock.send(b"b\n").await.unwrap();

        assert_eq!(mock.sent_data().len(), 2);
        assert_eq!(mock.sent_lines(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn mock_transport_wrong_data_errors() {
        let mut mock = MockTransport::new();
        mock.expect(b"a\n", b"");

        let result = mock.send(b"z\n").await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn mock_transport_no_expectations_errors() {
        let mut mock = MockTransport::new();
        let result = mock.send(b"a\n").await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn lenient_mock_accepts_unscripted_writes() {
        let mut mock = MockTransport::lenient();
        mock.send(b"anything\n").await.unwrap();
        assert_eq!(mock.sent_lines(), vec!["anything".to_string()]);
    }

    #[tokio::test]
    async fn mock_transport_receive_without_data_times_out() {
        let mut mock = MockTransport::new();
        let mut buf = [0u8; 64];

        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn push_inbound_wakes_a_waiting_receiver() {
        let mock = MockTransport::new();
        let mut reader = mock.clone();

        let task = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let n = reader
                .receive(&mut buf, Duration::from_secs(2))
                .await
                .unwrap();
            buf[..n].to_vec()
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        mock.push_inbound(b"S,1,gain,5\n");

        let received = task.await.unwrap();
        assert_eq!(received, b"S,1,gain,5\n");
    }

    #[tokio::test]
    async fn mock_transport_disconnect() {
        let mut mock = MockTransport::new();
        assert!(mock.is_connected());

        mock.close().await.unwrap();
        assert!(!mock.is_connected());

        let result = mock.send(b"a\n").await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn mock_transport_set_connected() {
        let mut mock = MockTransport::new();
        mock.set_connected(false);
        assert!(!mock.is_connected());

        let mut buf = [0u8; 8];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn mock_transport_partial_receive() {
        let mut mock = MockTransport::new();
        mock.push_inbound(b"ABCD");

        let mut buf = [0u8; 2];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"AB");

        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"CD");
    }

    #[tokio::test]
    async fn clones_share_state() {
        let mut mock = MockTransport::new();
        let observer = mock.clone();
        mock.expect(b"x\n", b"");
        assert_eq!(observer.remaining_expectations(), 1);
        mock.send(b"x\n").await.unwrap();
        assert_eq!(observer.remaining_expectations(), 0);
        assert_eq!(observer.sent_lines(), vec!["x".to_string()]);
    }
}
