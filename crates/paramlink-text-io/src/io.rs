//! IO task types and implementation for the parameter protocol.
//!
//! One tokio task owns the transport exclusively. Any number of
//! [`Dispatcher`] clones queue encoded commands on a bounded channel; the
//! task writes them one at a time, each as a single newline-terminated
//! line, so two commands can never interleave on the wire. Between writes
//! the task reads inbound lines and passes each to a [`LineHandler`].
//!
//! There is no request/response pairing: replies to a command arrive later
//! as ordinary inbound lines.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use paramlink_core::error::{Error, Result};
use paramlink_core::transport::Transport;
use paramlink_core::types::Command;

use crate::commands;
use crate::protocol::TERMINATOR;
use crate::reader::LineReader;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Configuration for the IO task.
#[derive(Debug, Clone)]
pub struct IoConfig {
    /// Upper bound on one idle receive; also the pause after a read error.
    pub poll_interval: Duration,
    /// Upper bound on writing one command.
    pub write_timeout: Duration,
    /// Depth of the command queue feeding the task.
    pub channel_capacity: usize,
}

impl Default for IoConfig {
    fn default() -> Self {
        IoConfig {
            poll_interval: Duration::from_millis(100),
            write_timeout: Duration::from_secs(1),
            channel_capacity: 32,
        }
    }
}

/// A request sent from a [`Dispatcher`] (or the handle) to the IO task.
pub enum Request {
    /// Write one encoded command followed by the line terminator.
    Write {
        wire: String,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Close the transport, hand it back, and exit.
    Shutdown {
        reply: oneshot::Sender<Box<dyn Transport>>,
    },
}

/// Receives what the IO task reads and writes.
///
/// Called from inside the IO task, so implementations must not block.
pub trait LineHandler: Send + Sync + 'static {
    /// A trimmed, non-empty inbound line.
    fn on_line(&self, line: &str);

    /// `wire` was written in full.
    fn on_sent(&self, _wire: &str) {}

    /// Writing `wire` failed; the command has been abandoned.
    fn on_send_failed(&self, _wire: &str, _error: &Error) {}
}

/// A [`LineHandler`] that ignores everything.
pub struct NullLineHandler;

impl LineHandler for NullLineHandler {
    fn on_line(&self, _line: &str) {}
}

/// Outcome of submitting a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// The encoded command text, without terminator.
    pub wire: String,
    /// Whether the whole line reached the transport. A `false` here has
    /// already been logged and reported through [`LineHandler::on_send_failed`].
    pub delivered: bool,
}

/// Cloneable handle for submitting commands to the IO task.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<Request>,
}

impl Dispatcher {
    /// Encode `command` and write it to the device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] or [`Error::InvalidSelector`] when the
    /// command cannot be encoded (nothing is written), and
    /// [`Error::NotConnected`] when the IO task has stopped. Transport
    /// failures are not errors here; see [`Dispatch::delivered`].
    pub async fn submit(&self, command: &Command) -> Result<Dispatch> {
        let wire = commands::encode(command).inspect_err(|e| {
            debug!(kind = command.kind(), error = %e, "command rejected");
        })?;
        self.write(wire).await
    }

    async fn write(&self, wire: String) -> Result<Dispatch> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Write {
                wire: wire.clone(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;

        // Every write is bounded by `write_timeout` inside the task, so the
        // reply always arrives.
        match reply_rx.await {
            Ok(Ok(())) => Ok(Dispatch {
                wire,
                delivered: true,
            }),
            Ok(Err(_)) => Ok(Dispatch {
                wire,
                delivered: false,
            }),
            Err(_) => Err(Error::NotConnected),
        }
    }

    /// Whether the IO task has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Handle to the IO task.
pub struct IoHandle {
    /// Command channel into the task.
    pub tx: mpsc::Sender<Request>,
    /// Cancellation token for an immediate stop.
    pub cancel: CancellationToken,
    /// Join handle for the IO task.
    pub task: JoinHandle<()>,
}

impl IoHandle {
    /// A new dispatcher feeding this task.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            tx: self.tx.clone(),
        }
    }

    /// Stop the task after any queued writes, close the transport, and
    /// recover it.
    pub async fn shutdown(self) -> Result<Box<dyn Transport>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self.tx.send(Request::Shutdown { reply: reply_tx }).await;
        let transport = reply_rx.await.map_err(|_| Error::NotConnected)?;
        let _ = self.task.await;
        Ok(transport)
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn the IO task. Returns the handle for submitting commands.
pub fn spawn_io_task(
    transport: Box<dyn Transport>,
    config: IoConfig,
    handler: Arc<dyn LineHandler>,
) -> IoHandle {
    let (tx, rx) = mpsc::channel::<Request>(config.channel_capacity.max(1));
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    let task = tokio::spawn(io_loop(transport, config, handler, rx, cancel_clone));

    IoHandle { tx, cancel, task }
}

// ---------------------------------------------------------------------------
// IO Loop
// ---------------------------------------------------------------------------

/// The main IO loop. Runs as a spawned Tokio task.
///
/// Uses `tokio::select! { biased; }` to prioritize:
/// 1. Cancellation
/// 2. Queued writes and shutdown
/// 3. Idle line reading
async fn io_loop(
    mut transport: Box<dyn Transport>,
    config: IoConfig,
    handler: Arc<dyn LineHandler>,
    mut rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    let mut reader = LineReader::new(config.poll_interval);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("IO task cancelled");
                break;
            }

            req = rx.recv() => {
                match req {
                    Some(Request::Write { wire, reply }) => {
                        let result = write_line(&mut *transport, &wire, &config, &*handler).await;
                        let _ = reply.send(result);
                    }
                    Some(Request::Shutdown { reply }) => {
                        debug!("IO task shutdown requested");
                        close_transport(&mut *transport).await;
                        let _ = reply.send(transport);
                        return;
                    }
                    None => {
                        debug!("request channel closed, exiting IO task");
                        break;
                    }
                }
            }

            line = reader.next_line(&mut *transport) => {
                handler.on_line(&line);
            }
        }
    }

    close_transport(&mut *transport).await;
}

async fn close_transport(transport: &mut dyn Transport) {
    if let Err(e) = transport.close().await {
        tracing::warn!(error = %e, "failed to close transport");
    }
}

/// Write one command line, bounded by `write_timeout`.
///
/// A write abandoned part-way is followed by a bare terminator so the next
/// command starts on a fresh line.
async fn write_line(
    transport: &mut dyn Transport,
    wire: &str,
    config: &IoConfig,
    handler: &dyn LineHandler,
) -> Result<()> {
    let framed = commands::frame(wire);
    let result = match tokio::time::timeout(config.write_timeout, transport.send(&framed)).await {
        Ok(result) => result,
        Err(_) => {
            let _ = tokio::time::timeout(config.write_timeout, transport.send(&[TERMINATOR])).await;
            Err(Error::Timeout)
        }
    };

    match &result {
        Ok(()) => {
            debug!(wire, "command written");
            handler.on_sent(wire);
        }
        Err(e) => {
            tracing::error!(wire, error = %e, "failed to write command");
            handler.on_send_failed(wire, e);
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use paramlink_core::types::{Command, PinKind};
    use paramlink_test_harness::{MockTransport, SlowTransport};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        lines: Mutex<Vec<String>>,
        sent: Mutex<Vec<String>>,
        failed: Mutex<Vec<String>>,
    }

    impl LineHandler for Recorder {
        fn on_line(&self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }

        fn on_sent(&self, wire: &str) {
            self.sent.lock().unwrap().push(wire.to_string());
        }

        fn on_send_failed(&self, wire: &str, _error: &Error) {
            self.failed.lock().unwrap().push(wire.to_string());
        }
    }

    fn test_config() -> IoConfig {
        IoConfig {
            poll_interval: Duration::from_millis(10),
            write_timeout: Duration::from_millis(500),
            channel_capacity: 8,
        }
    }

    async fn wait_until(cond: impl Fn() -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while !cond() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "condition not met in time"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn spawn_with(transport: impl Transport + 'static) -> (IoHandle, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let io = spawn_io_task(Box::new(transport), test_config(), recorder.clone());
        (io, recorder)
    }

    // =======================================================================
    // Writes
    // =======================================================================

    #[tokio::test]
    async fn submit_writes_framed_command() {
        let mock = MockTransport::new();
        mock.expect(b"get:AlladdedParams\n", b"");
        let (io, recorder) = spawn_with(mock.clone());

        let dispatch = io.dispatcher().submit(&Command::ListAllParams).await.unwrap();
        assert_eq!(
            dispatch,
            Dispatch {
                wire: "get:AlladdedParams".into(),
                delivered: true
            }
        );
        assert_eq!(mock.remaining_expectations(), 0);
        assert_eq!(*recorder.sent.lock().unwrap(), vec!["get:AlladdedParams"]);
    }

    #[tokio::test]
    async fn invalid_command_never_reaches_transport() {
        let mock = MockTransport::lenient();
        let (io, recorder) = spawn_with(mock.clone());

        let cmd = Command::ReadPin {
            kind: PinKind::Analog,
            designator: "B3".into(),
        };
        let result = io.dispatcher().submit(&cmd).await;
        assert!(matches!(result, Err(Error::InvalidSelector(_))));
        assert!(mock.sent_data().is_empty());
        assert!(recorder.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_reported_not_raised() {
        // No expectations: the mock rejects every write.
        let mock = MockTransport::new();
        let (io, recorder) = spawn_with(mock);

        let cmd = Command::GetParam {
            name: "gain".into(),
        };
        let dispatch = io.dispatcher().submit(&cmd).await.unwrap();
        assert!(!dispatch.delivered);
        assert_eq!(*recorder.failed.lock().unwrap(), vec!["get:paramCurval,gain"]);
    }

    #[tokio::test]
    async fn slow_write_times_out() {
        let slow = SlowTransport::new(Duration::from_millis(20));
        let recorder = Arc::new(Recorder::default());
        let config = IoConfig {
            write_timeout: Duration::from_millis(30),
            ..test_config()
        };
        let io = spawn_io_task(Box::new(slow), config, recorder.clone());

        let dispatch = io
            .dispatcher()
            .submit(&Command::ListAllParams)
            .await
            .unwrap();
        assert!(!dispatch.delivered);
        assert_eq!(recorder.failed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_submits_never_interleave() {
        let slow = SlowTransport::new(Duration::from_millis(1));
        let observer = slow.clone();
        let (io, _recorder) = spawn_with(slow);

        let mut tasks = Vec::new();
        for i in 0..8 {
            let dispatcher = io.dispatcher();
            tasks.push(tokio::spawn(async move {
                let cmd = Command::SetSoftware {
                    name: format!("software{i}"),
                };
                dispatcher.submit(&cmd).await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().unwrap().delivered);
        }

        let mut lines = observer.captured_lines();
        lines.sort();
        let mut expected: Vec<String> = (0..8).map(|i| format!("set:software,software{i}")).collect();
        expected.sort();
        assert_eq!(lines, expected);
    }

    // =======================================================================
    // Reads
    // =======================================================================

    #[tokio::test]
    async fn scripted_reply_reaches_handler() {
        let mock = MockTransport::new();
        mock.expect(
            b"get:AlladdedParams\n",
            b"L,0,gain,0,10,5\nL,1,mute,0,1,0\n",
        );
        let (io, recorder) = spawn_with(mock);

        io.dispatcher().submit(&Command::ListAllParams).await.unwrap();
        wait_until(|| recorder.lines.lock().unwrap().len() == 2).await;
        assert_eq!(
            *recorder.lines.lock().unwrap(),
            vec!["L,0,gain,0,10,5", "L,1,mute,0,1,0"]
        );
    }

    #[tokio::test]
    async fn unsolicited_lines_reach_handler() {
        let mock = MockTransport::new();
        let (_io, recorder) = spawn_with(mock.clone());

        mock.push_inbound(b"S,1,gain,6\n\n");
        wait_until(|| !recorder.lines.lock().unwrap().is_empty()).await;
        assert_eq!(*recorder.lines.lock().unwrap(), vec!["S,1,gain,6"]);
    }

    // =======================================================================
    // Shutdown
    // =======================================================================

    #[tokio::test]
    async fn shutdown_closes_and_recovers_transport() {
        let mock = MockTransport::new();
        let (io, _recorder) = spawn_with(mock);

        let transport = io.shutdown().await.unwrap();
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn shutdown_waits_for_in_flight_write() {
        let slow = SlowTransport::new(Duration::from_millis(2));
        let observer = slow.clone();
        let (io, _recorder) = spawn_with(slow);

        let dispatcher = io.dispatcher();
        let pending = tokio::spawn(async move {
            dispatcher
                .submit(&Command::SetSoftware {
                    name: "synth".into(),
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        io.shutdown().await.unwrap();
        assert!(pending.await.unwrap().unwrap().delivered);
        assert_eq!(observer.captured_lines(), vec!["set:software,synth"]);
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_not_connected() {
        let mock = MockTransport::lenient();
        let (io, _recorder) = spawn_with(mock);
        let dispatcher = io.dispatcher();

        io.shutdown().await.unwrap();
        assert!(dispatcher.is_closed());
        let result = dispatcher.submit(&Command::ListAllParams).await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn cancel_stops_task() {
        let mock = MockTransport::new();
        let (io, _recorder) = spawn_with(mock.clone());

        io.cancel.cancel();
        io.task.await.unwrap();
        assert!(!mock.is_connected());
    }
}
