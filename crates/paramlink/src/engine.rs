//! The assembled engine.

use std::sync::Arc;

use tokio::sync::broadcast;

use paramlink_core::error::Result;
use paramlink_core::events::Notification;
use paramlink_core::transport::Transport;
use paramlink_core::types::Command;
use paramlink_text_io::io::{self, Dispatch, Dispatcher, IoConfig, IoHandle};

use crate::api::Api;
use crate::applier::Applier;
use crate::observer::{LogBuffer, Observer};
use crate::status::DeviceStatus;
use crate::store::ParameterStore;

/// A running protocol engine: registry, status, operator log, and the IO
/// task that owns the transport.
///
/// Every component is created once here and handed out by reference, so
/// the API layer and any renderer share the same state. Build one with
/// [`EngineBuilder`](crate::EngineBuilder).
pub struct Engine {
    store: Arc<ParameterStore>,
    status: Arc<DeviceStatus>,
    log: Arc<LogBuffer>,
    applier: Arc<Applier>,
    event_tx: broadcast::Sender<Notification>,
    dispatcher: Dispatcher,
    io: IoHandle,
}

impl Engine {
    pub(crate) fn start(
        transport: Box<dyn Transport>,
        io_config: IoConfig,
        log_capacity: usize,
        event_capacity: usize,
        observers: Vec<Arc<dyn Observer>>,
    ) -> Self {
        let store = Arc::new(ParameterStore::new());
        let status = Arc::new(DeviceStatus::new());
        let log = Arc::new(LogBuffer::new(log_capacity));
        let (event_tx, _) = broadcast::channel(event_capacity.max(1));

        let mut applier = Applier::new(store.clone(), status.clone(), event_tx.clone())
            .with_observer(log.clone());
        for observer in observers {
            applier = applier.with_observer(observer);
        }
        let applier = Arc::new(applier);

        tracing::info!(
            poll_interval = ?io_config.poll_interval,
            write_timeout = ?io_config.write_timeout,
            "starting engine"
        );
        let io = io::spawn_io_task(transport, io_config, applier.clone());
        let dispatcher = io.dispatcher();

        Engine {
            store,
            status,
            log,
            applier,
            event_tx,
            dispatcher,
            io,
        }
    }

    pub fn store(&self) -> &Arc<ParameterStore> {
        &self.store
    }

    pub fn status(&self) -> &Arc<DeviceStatus> {
        &self.status
    }

    pub fn log(&self) -> &Arc<LogBuffer> {
        &self.log
    }

    /// A handle for submitting commands; clone freely.
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// Encode and send one command.
    pub async fn submit(&self, command: &Command) -> Result<Dispatch> {
        self.dispatcher.submit(command).await
    }

    /// Receive every notification published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.event_tx.subscribe()
    }

    /// Empty the parameter registry. Returns how many records were removed.
    pub fn clear_parameters(&self) -> usize {
        self.applier.clear()
    }

    /// Request handlers bound to this engine.
    pub fn api(&self) -> Api {
        Api::new(self.store.clone(), self.status.clone(), self.log.clone(), self.dispatcher())
    }

    /// Stop reading, let queued writes finish, close the transport and
    /// return it.
    pub async fn shutdown(self) -> Result<Box<dyn Transport>> {
        tracing::info!("shutting down engine");
        self.io.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EngineBuilder;
    use paramlink_core::Error;
    use paramlink_core::types::{NewValue, PinKind};
    use paramlink_test_harness::{MockTransport, SlowTransport};
    use std::time::Duration;

    async fn engine_with(mock: &MockTransport) -> Engine {
        EngineBuilder::new()
            .poll_interval(Duration::from_millis(10))
            .build_with_transport(Box::new(mock.clone()))
            .await
            .unwrap()
    }

    async fn wait_until(cond: impl Fn() -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while !cond() {
            assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn listing_round_trip_populates_store() {
        let mock = MockTransport::new();
        mock.expect(
            b"get:AlladdedParams\n",
            b"L,0,gain,0,10,5\r\nL,1,mute,0,1,0\r\n",
        );
        let engine = engine_with(&mock).await;

        let dispatch = engine.submit(&Command::ListAllParams).await.unwrap();
        assert!(dispatch.delivered);

        wait_until(|| engine.store().len() == 2).await;
        let names: Vec<String> = engine.store().snapshot().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["gain", "mute"]);
    }

    #[tokio::test]
    async fn update_reply_merges_into_listing() {
        let mock = MockTransport::new();
        mock.expect(b"get:AlladdedParams\n", b"L,3,gain,0,10,5\n");
        mock.expect(b"update:paramsCurval,gain,7\n", b"U,gain,7\n");
        let engine = engine_with(&mock).await;

        engine.submit(&Command::ListAllParams).await.unwrap();
        wait_until(|| engine.store().contains("gain")).await;
        engine
            .submit(&Command::UpdateParam {
                name: "gain".into(),
                new_value: NewValue::Int(7),
            })
            .await
            .unwrap();
        wait_until(|| {
            engine
                .store()
                .get("gain")
                .is_some_and(|p| p.current.as_deref() == Some("7"))
        })
        .await;

        let p = engine.store().get("gain").unwrap();
        assert_eq!(p.index, Some(3));
        assert_eq!(p.max.as_deref(), Some("10"));
    }

    #[tokio::test]
    async fn unsolicited_switch_and_pin_read() {
        let mock = MockTransport::new();
        let engine = engine_with(&mock).await;

        mock.push_inbound(b"S,2,gain,4\nD,7,1\n");
        wait_until(|| engine.status().last_reading().is_some()).await;
        assert_eq!(engine.store().get("gain").unwrap().index, Some(2));
        assert_eq!(
            engine.status().reading(PinKind::Digital, "7").unwrap().value,
            "1"
        );
    }

    #[tokio::test]
    async fn subscribers_see_sent_and_received() {
        let mock = MockTransport::new();
        mock.expect(b"set:software,synth\n", b"S,software set to,synth\n");
        let engine = engine_with(&mock).await;
        let mut rx = engine.subscribe();

        engine
            .submit(&Command::SetSoftware {
                name: "synth".into(),
            })
            .await
            .unwrap();

        let mut seen = Vec::new();
        while seen.len() < 3 {
            let n = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            seen.push(n.to_string());
        }
        assert_eq!(
            seen,
            vec![
                "Sending: set:software,synth",
                "Received: S,software set to,synth",
                "Software name updated to: synth"
            ]
        );
        assert_eq!(engine.status().software_name(), "synth");
    }

    #[tokio::test]
    async fn failed_write_is_logged_and_engine_keeps_running() {
        // Non-lenient mock with no script rejects the first write.
        let mock = MockTransport::new();
        let engine = engine_with(&mock).await;

        let dispatch = engine.submit(&Command::ListAllParams).await.unwrap();
        assert!(!dispatch.delivered);
        assert!(
            engine
                .log()
                .text()
                .starts_with("Error sending command get:AlladdedParams: transport error:")
        );

        mock.push_inbound(b"A,gain\n");
        wait_until(|| engine.store().contains("gain")).await;
    }

    #[tokio::test]
    async fn validation_error_reaches_caller() {
        let mock = MockTransport::lenient();
        let engine = engine_with(&mock).await;

        let result = engine
            .submit(&Command::GetParam {
                name: String::new(),
            })
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(mock.sent_data().is_empty());
    }

    #[tokio::test]
    async fn clear_parameters_logs_and_empties() {
        let mock = MockTransport::new();
        let engine = engine_with(&mock).await;
        mock.push_inbound(b"A,gain\n");
        wait_until(|| engine.store().contains("gain")).await;

        assert_eq!(engine.clear_parameters(), 1);
        assert!(engine.store().snapshot().is_empty());
        assert!(engine.log().text().ends_with("Parameter list cleared.\n"));
    }

    #[tokio::test]
    async fn concurrent_submits_are_whole_lines() {
        let slow = SlowTransport::new(Duration::from_millis(1));
        let observer = slow.clone();
        let engine = EngineBuilder::new()
            .build_with_transport(Box::new(slow))
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for i in 0..6 {
            let dispatcher = engine.dispatcher();
            tasks.push(tokio::spawn(async move {
                dispatcher
                    .submit(&Command::GetParam {
                        name: format!("param{i}"),
                    })
                    .await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().unwrap().delivered);
        }

        let lines = observer.captured_lines();
        assert_eq!(lines.len(), 6);
        for line in &lines {
            assert!(line.starts_with("get:paramCurval,param"), "mangled line {line:?}");
            assert_eq!(line.len(), "get:paramCurval,param0".len());
        }
    }

    #[tokio::test]
    async fn shutdown_returns_closed_transport() {
        let mock = MockTransport::new();
        let engine = engine_with(&mock).await;
        let dispatcher = engine.dispatcher();

        let transport = engine.shutdown().await.unwrap();
        assert!(!transport.is_connected());
        assert!(matches!(
            dispatcher.submit(&Command::ListAllParams).await,
            Err(Error::NotConnected)
        ));
    }
}
