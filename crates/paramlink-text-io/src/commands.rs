//! Outbound command encoder.
//!
//! Each [`Command`] maps to exactly one line of ASCII text. The encoder
//! validates the command first: empty required fields, embedded commas,
//! and line breaks are rejected here and never reach the transport.
//!
//! | Command | Wire text |
//! |---|---|
//! | read digital pin `p` | `read:digital,<p>` |
//! | read analog input `A<n>` | `read:analog,<n>` |
//! | add parameter | `add:param,<name>,<min>,<max>,<current>` |
//! | update parameter | `update:paramsCurval,<name>,<value>` |
//! | get one parameter | `get:paramCurval,<name>` |
//! | list all parameters | `get:AlladdedParams` |
//! | set software name | `set:software,<name>` |
//! | raw | the text, unchanged |
//!
//! The returned text carries no terminator; [`frame`] appends the newline
//! when the IO task writes it.

use paramlink_core::error::{Error, Result};
use paramlink_core::types::{Command, PinKind, parse_analog_label};

use crate::protocol::TERMINATOR;

pub const READ_DIGITAL: &str = "read:digital";
pub const READ_ANALOG: &str = "read:analog";
pub const ADD_PARAM: &str = "add:param";
pub const UPDATE_PARAM: &str = "update:paramsCurval";
pub const GET_PARAM: &str = "get:paramCurval";
pub const LIST_ALL_PARAMS: &str = "get:AlladdedParams";
pub const SET_SOFTWARE: &str = "set:software";

/// Trim each named field and collect the names of any that end up empty.
fn require<'a, const N: usize>(
    fields: [(&'static str, &'a str); N],
) -> Result<[&'a str; N]> {
    let trimmed = fields.map(|(name, value)| (name, value.trim()));
    let missing: Vec<&str> = trimmed
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(Error::missing_fields(&missing));
    }
    for (name, value) in &trimmed {
        check_field(name, value)?;
    }
    Ok(trimmed.map(|(_, value)| value))
}

/// Reject values that would shift or split the comma-separated line.
fn check_field(name: &str, value: &str) -> Result<()> {
    if value.contains(',') {
        return Err(Error::Validation(format!("{name} must not contain a comma")));
    }
    if value.contains(['\n', '\r']) {
        return Err(Error::Validation(format!(
            "{name} must not contain a line break"
        )));
    }
    Ok(())
}

/// Encode a command into its wire text, without the trailing newline.
///
/// # Errors
///
/// - [`Error::Validation`] when a required field is empty, or a field holds
///   a comma or line break.
/// - [`Error::InvalidSelector`] when an analog designator is not `A<n>`.
///
/// # Examples
///
/// ```
/// use paramlink_core::types::{Command, PinKind};
/// use paramlink_text_io::commands::encode;
///
/// let cmd = Command::ReadPin { kind: PinKind::Analog, designator: "A3".into() };
/// assert_eq!(encode(&cmd).unwrap(), "read:analog,3");
/// ```
pub fn encode(command: &Command) -> Result<String> {
    match command {
        Command::ReadPin {
            kind: PinKind::Digital,
            designator,
        } => {
            let [pin] = require([("designator", designator.as_str())])?;
            Ok(format!("{READ_DIGITAL},{pin}"))
        }
        Command::ReadPin {
            kind: PinKind::Analog,
            designator,
        } => {
            let [label] = require([("designator", designator.as_str())])?;
            let input = parse_analog_label(label)?;
            Ok(format!("{READ_ANALOG},{input}"))
        }
        Command::AddParam {
            name,
            min,
            max,
            current,
        } => {
            let [name, min, max, current] = require([
                ("name", name.as_str()),
                ("min", min.as_str()),
                ("max", max.as_str()),
                ("current", current.as_str()),
            ])?;
            Ok(format!("{ADD_PARAM},{name},{min},{max},{current}"))
        }
        Command::UpdateParam { name, new_value } => {
            let value = new_value.to_wire();
            let [name, value] = require([("name", name.as_str()), ("newValue", value.as_str())])?;
            Ok(format!("{UPDATE_PARAM},{name},{value}"))
        }
        Command::GetParam { name } => {
            let [name] = require([("name", name.as_str())])?;
            Ok(format!("{GET_PARAM},{name}"))
        }
        Command::ListAllParams => Ok(LIST_ALL_PARAMS.to_string()),
        Command::SetSoftware { name } => {
            let [name] = require([("name", name.as_str())])?;
            Ok(format!("{SET_SOFTWARE},{name}"))
        }
        Command::Raw { text } => {
            if text.trim().is_empty() {
                return Err(Error::missing_fields(&["command"]));
            }
            if text.contains(['\n', '\r']) {
                return Err(Error::Validation(
                    "command must not contain a line break".into(),
                ));
            }
            Ok(text.clone())
        }
    }
}

/// Append the line terminator to encoded wire text.
pub fn frame(wire: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(wire.len() + 1);
    bytes.extend_from_slice(wire.as_bytes());
    bytes.push(TERMINATOR);
    bytes
}
