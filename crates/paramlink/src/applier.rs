//! Event applier: turns decoded lines into registry and status changes.
//!
//! [`Applier`] is the [`LineHandler`] the IO task calls for every inbound
//! line, and so is the only writer of the [`ParameterStore`]. Each step is
//! published as a [`Notification`] to the registered observers and to the
//! broadcast channel.

use std::sync::Arc;

use tokio::sync::broadcast;

use paramlink_core::error::Error;
use paramlink_core::events::{Event, Notification};
use paramlink_core::types::{Parameter, ParameterPatch, PinKind};
use paramlink_text_io::io::LineHandler;
use paramlink_text_io::protocol::decode_line;

use crate::observer::Observer;
use crate::status::DeviceStatus;
use crate::store::ParameterStore;

pub struct Applier {
    store: Arc<ParameterStore>,
    status: Arc<DeviceStatus>,
    observers: Vec<Arc<dyn Observer>>,
    event_tx: broadcast::Sender<Notification>,
}

impl Applier {
    pub fn new(
        store: Arc<ParameterStore>,
        status: Arc<DeviceStatus>,
        event_tx: broadcast::Sender<Notification>,
    ) -> Self {
        Applier {
            store,
            status,
            observers: Vec::new(),
            event_tx,
        }
    }

    /// Register an observer. Observers are called in registration order.
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    fn publish(&self, notification: Notification) {
        for observer in &self.observers {
            observer.notify(&notification);
        }
        // No subscribers is fine.
        let _ = self.event_tx.send(notification);
    }

    /// Apply one event. Returns the notification describing the outcome.
    pub fn apply(&self, event: Event) -> Notification {
        let description = match &event {
            Event::DigitalRead { pin, value } => self
                .status
                .record_reading(PinKind::Digital, pin, value)
                .to_string(),
            Event::AnalogRead { index, value } => self
                .status
                .record_reading(PinKind::Analog, index, value)
                .to_string(),
            Event::ParamAdded { name } => {
                self.store.upsert(name, &ParameterPatch::empty());
                format!("Parameter added: {name}")
            }
            Event::ParamUpdated { name, value } => {
                self.store.upsert(name, &ParameterPatch::current(value.as_str()));
                format!("Parameter {name} updated to {value}")
            }
            Event::SoftwareSet { name } => {
                self.status.set_software_name(name);
                format!("Software name updated to: {name}")
            }
            Event::ParamSwitched {
                index,
                name,
                current,
            } => {
                let patch = ParameterPatch {
                    index: *index,
                    current: Some(current.clone()),
                    ..ParameterPatch::default()
                };
                self.store.upsert(name, &patch);
                match index {
                    Some(i) => format!("Switched to parameter {name} (index {i})"),
                    None => format!("Switched to parameter {name}"),
                }
            }
            Event::ParamGet { name, value } => {
                self.store.upsert(name, &ParameterPatch::current(value.as_str()));
                format!("Parameter {name} current value: {value}")
            }
            Event::ParamList {
                index,
                name,
                min,
                max,
                current,
            } => {
                // A listing row is authoritative for all four fields, so an
                // unparseable index clears the old one.
                self.store.replace(Parameter {
                    name: name.clone(),
                    index: *index,
                    min: Some(min.clone()),
                    max: Some(max.clone()),
                    current: Some(current.clone()),
                });
                format!("List: {name} -> min:{min}, max:{max}, current:{current}")
            }
            Event::Unrecognized { raw } => {
                tracing::warn!(line = %raw, "unrecognized message");
                return Notification::Unrecognized { line: raw.clone() };
            }
        };

        tracing::debug!(%description, "event applied");
        Notification::Applied { event, description }
    }

    /// Decode, apply and publish one inbound line.
    pub fn handle_line(&self, line: &str) {
        tracing::trace!(line, "line received");
        self.publish(Notification::Received {
            line: line.to_string(),
        });
        let outcome = self.apply(decode_line(line));
        self.publish(outcome);
    }

    /// Empty the registry and announce it.
    pub fn clear(&self) -> usize {
        let removed = self.store.clear_all();
        tracing::info!(removed, "parameter registry cleared");
        self.publish(Notification::Cleared);
        removed
    }
}

impl LineHandler for Applier {
    fn on_line(&self, line: &str) {
        self.handle_line(line);
    }

    fn on_sent(&self, wire: &str) {
        self.publish(Notification::Sent {
            wire: wire.to_string(),
        });
    }

    fn on_send_failed(&self, wire: &str, error: &Error) {
        self.publish(Notification::SendFailed {
            wire: wire.to_string(),
            error: error.to_string(),
        });
    }
}
