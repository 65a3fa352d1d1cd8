//! Inbound event types and observer notifications.
//!
//! Every trimmed, non-empty line read from the device decodes to exactly one
//! [`Event`]. Applying events to the parameter registry produces
//! [`Notification`]s, which are delivered to observers (the operator log,
//! UI renderers, and async subscribers on a [`tokio::sync::broadcast`]
//! channel).
//!
//! [`tokio::sync::broadcast`]: https://docs.rs/tokio/latest/tokio/sync/broadcast/

use std::fmt;

/// One decoded inbound status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `D,<pin>,<value>` -- result of a digital pin read.
    DigitalRead {
        /// Pin number, as sent.
        pin: String,
        /// Reported level.
        value: String,
    },

    /// `A,<index>,<value>` -- result of an analog input read.
    AnalogRead {
        /// Analog input number (the `n` of `A<n>`).
        index: String,
        /// Reported sample.
        value: String,
    },

    /// `A,<name>` -- a parameter was added on the device.
    ParamAdded { name: String },

    /// `U,<name>,<value>` -- a parameter's current value changed.
    ParamUpdated { name: String, value: String },

    /// `S,software set to,<name>` -- the software name changed.
    SoftwareSet { name: String },

    /// `S,<index>,<name>,<current>` -- the device selected another parameter.
    ParamSwitched {
        /// Slot index; `None` if the token was not an integer.
        index: Option<u32>,
        name: String,
        current: String,
    },

    /// `G,<name>,<value>` -- reply to a get-current-value request.
    ParamGet { name: String, value: String },

    /// `L,<index>,<name>,<min>,<max>,<current>` -- one row of a full listing.
    ParamList {
        /// Slot index; `None` if the token was not an integer.
        index: Option<u32>,
        name: String,
        min: String,
        max: String,
        current: String,
    },

    /// A line that matched no decode rule.
    Unrecognized { raw: String },
}

impl Event {
    /// The parameter this event names, if any.
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Event::ParamAdded { name }
            | Event::ParamUpdated { name, .. }
            | Event::ParamSwitched { name, .. }
            | Event::ParamGet { name, .. }
            | Event::ParamList { name, .. } => Some(name),
            Event::DigitalRead { .. }
            | Event::AnalogRead { .. }
            | Event::SoftwareSet { .. }
            | Event::Unrecognized { .. } => None,
        }
    }
}

/// What observers are told as the engine reads, applies, and sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A raw line arrived from the device (before decoding).
    Received { line: String },

    /// An event was applied to engine state.
    Applied {
        event: Event,
        /// Human-readable account of the resulting state change.
        description: String,
    },

    /// A line matched no decode rule; nothing was changed.
    Unrecognized { line: String },

    /// An encoded command was written to the transport.
    Sent { wire: String },

    /// Writing an encoded command failed; the command was abandoned.
    SendFailed { wire: String, error: String },

    /// The parameter registry was cleared.
    Cleared,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Received { line } => write!(f, "Received: {line}"),
            Notification::Applied { description, .. } => f.write_str(description),
            Notification::Unrecognized { line } => write!(f, "Unrecognized message: {line}"),
            Notification::Sent { wire } => write!(f, "Sending: {wire}"),
            Notification::SendFailed { wire, error } => {
                write!(f, "Error sending command {wire}: {error}")
            }
            Notification::Cleared => f.write_str("Parameter list cleared."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_name_for_parameter_events() {
        let e = Event::ParamUpdated {
            name: "gain".into(),
            value: "7".into(),
        };
        assert_eq!(e.param_name(), Some("gain"));
        let e = Event::ParamList {
            index: Some(0),
            name: "gain".into(),
            min: "0".into(),
            max: "10".into(),
            current: "5".into(),
        };
        assert_eq!(e.param_name(), Some("gain"));
    }

    #[test]
    fn param_name_absent_for_other_events() {
        let e = Event::AnalogRead {
            index: "5".into(),
            value: "3".into(),
        };
        assert_eq!(e.param_name(), None);
        let e = Event::SoftwareSet {
            name: "synth".into(),
        };
        assert_eq!(e.param_name(), None);
    }

    #[test]
    fn notification_log_lines() {
        assert_eq!(
            Notification::Received {
                line: "A,gain".into()
            }
            .to_string(),
            "Received: A,gain"
        );
        assert_eq!(
            Notification::Sent {
                wire: "get:AlladdedParams".into()
            }
            .to_string(),
            "Sending: get:AlladdedParams"
        );
        assert_eq!(
            Notification::Unrecognized {
                line: "ERR,Unknown command".into()
            }
            .to_string(),
            "Unrecognized message: ERR,Unknown command"
        );
        assert_eq!(
            Notification::SendFailed {
                wire: "set:software,synth".into(),
                error: "timeout waiting for transport".into()
            }
            .to_string(),
            "Error sending command set:software,synth: timeout waiting for transport"
        );
        assert_eq!(Notification::Cleared.to_string(), "Parameter list cleared.");
    }

    #[test]
    fn applied_displays_description() {
        let n = Notification::Applied {
            event: Event::ParamAdded {
                name: "gain".into(),
            },
            description: "Parameter added: gain".into(),
        };
        assert_eq!(n.to_string(), "Parameter added: gain");
    }
}
