//! Device-agnostic data types: parameters, pin readings, and commands.
//!
//! Parameter fields are carried as the exact text the device reported. The
//! device firmware stores integers, but it also answers `ERROR` in value
//! positions, so the registry keeps the original representation and leaves
//! numeric interpretation to the reader (see [`Parameter::current_as_int`]).

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// A named parameter record tracked by the engine.
///
/// `name` is the sole identity. Every other field is `None` until some
/// inbound event supplies it; `None` is never conflated with a zero value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Unique parameter name.
    pub name: String,
    /// Slot index on the device, if reported.
    pub index: Option<u32>,
    /// Lower bound, as reported.
    pub min: Option<String>,
    /// Upper bound, as reported.
    pub max: Option<String>,
    /// Current value, as reported.
    pub current: Option<String>,
}

impl Parameter {
    /// Create a record with every field unset.
    pub fn new(name: impl Into<String>) -> Self {
        Parameter {
            name: name.into(),
            index: None,
            min: None,
            max: None,
            current: None,
        }
    }

    /// The current value as an integer, if it is set and parses as one.
    pub fn current_as_int(&self) -> Option<i64> {
        self.current.as_deref().and_then(|c| c.trim().parse().ok())
    }
}

/// A partial set of parameter fields carried by one event.
///
/// Only the fields that are `Some` are merged into an existing record;
/// the others are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterPatch {
    pub index: Option<u32>,
    pub min: Option<String>,
    pub max: Option<String>,
    pub current: Option<String>,
}

impl ParameterPatch {
    /// A patch that carries no fields (used to register a name).
    pub fn empty() -> Self {
        Self::default()
    }

    /// A patch that only sets `current`.
    pub fn current(value: impl Into<String>) -> Self {
        ParameterPatch {
            current: Some(value.into()),
            ..Self::default()
        }
    }

    /// Whether this patch carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.index.is_none() && self.min.is_none() && self.max.is_none() && self.current.is_none()
    }

    /// Merge the supplied fields into `param`.
    pub fn apply_to(&self, param: &mut Parameter) {
        if let Some(index) = self.index {
            param.index = Some(index);
        }
        if let Some(ref min) = self.min {
            param.min = Some(min.clone());
        }
        if let Some(ref max) = self.max {
            param.max = Some(max.clone());
        }
        if let Some(ref current) = self.current {
            param.current = Some(current.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Pins
// ---------------------------------------------------------------------------

/// Which kind of pin a read targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinKind {
    Digital,
    Analog,
}

impl fmt::Display for PinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinKind::Digital => write!(f, "digital"),
            PinKind::Analog => write!(f, "analog"),
        }
    }
}

/// Error returned when a pin kind string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePinKindError(pub String);

impl fmt::Display for ParsePinKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown pin kind: {} (expected digital or analog)", self.0)
    }
}

impl std::error::Error for ParsePinKindError {}

impl FromStr for PinKind {
    type Err = ParsePinKindError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "digital" | "d" => Ok(PinKind::Digital),
            "analog" | "a" => Ok(PinKind::Analog),
            _ => Err(ParsePinKindError(s.to_string())),
        }
    }
}

/// The most recent pin read result reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinReading {
    /// Digital or analog.
    pub kind: PinKind,
    /// Pin label: `"7"` for digital pin 7, `"A3"` for analog input 3.
    pub designator: String,
    /// The reported value, as text.
    pub value: String,
}

impl fmt::Display for PinReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PinKind::Digital => write!(f, "Digital Pin {}: {}", self.designator, self.value),
            PinKind::Analog => write!(f, "Analog Pin {}: {}", self.designator, self.value),
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// The value carried by an update command.
///
/// Booleans are sent as `1`/`0`; everything else is sent in its natural
/// text form.
#[derive(Debug, Clone, PartialEq)]
pub enum NewValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl NewValue {
    /// Render the value as it appears on the wire.
    pub fn to_wire(&self) -> String {
        match self {
            NewValue::Bool(true) => "1".to_string(),
            NewValue::Bool(false) => "0".to_string(),
            NewValue::Int(n) => n.to_string(),
            NewValue::Float(x) => x.to_string(),
            NewValue::Text(s) => s.trim().to_string(),
        }
    }

    /// Whether the value renders to nothing (only possible for text).
    pub fn is_blank(&self) -> bool {
        matches!(self, NewValue::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for NewValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl From<bool> for NewValue {
    fn from(b: bool) -> Self {
        NewValue::Bool(b)
    }
}

impl From<i64> for NewValue {
    fn from(n: i64) -> Self {
        NewValue::Int(n)
    }
}

impl From<f64> for NewValue {
    fn from(x: f64) -> Self {
        NewValue::Float(x)
    }
}

impl From<&str> for NewValue {
    fn from(s: &str) -> Self {
        NewValue::Text(s.to_string())
    }
}

impl From<String> for NewValue {
    fn from(s: String) -> Self {
        NewValue::Text(s)
    }
}

/// A typed outbound instruction, prior to encoding.
///
/// There is no request/response correlation on this protocol: a command is
/// written and any resulting status lines arrive as ordinary inbound
/// events.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Read a digital pin (`designator` = pin number) or an analog input
    /// (`designator` = label `A<n>`).
    ReadPin { kind: PinKind, designator: String },
    /// Register a new parameter on the device.
    AddParam {
        name: String,
        min: String,
        max: String,
        current: String,
    },
    /// Change a parameter's current value.
    UpdateParam { name: String, new_value: NewValue },
    /// Ask for one parameter's current value.
    GetParam { name: String },
    /// Ask the device to list every parameter it holds.
    ListAllParams,
    /// Set the software name shown on the device display.
    SetSoftware { name: String },
    /// Send text verbatim.
    Raw { text: String },
}

impl Command {
    /// Short name of the command variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::ReadPin { .. } => "read-pin",
            Command::AddParam { .. } => "add-param",
            Command::UpdateParam { .. } => "update-param",
            Command::GetParam { .. } => "get-param",
            Command::ListAllParams => "list-all-params",
            Command::SetSoftware { .. } => "set-software",
            Command::Raw { .. } => "raw",
        }
    }
}

/// Parse an analog pin label of the form `A<n>` into its input number.
///
/// The leading `A` is case-insensitive; the remainder must be a
/// non-negative integer.
///
/// ```
/// use paramlink_core::types::parse_analog_label;
///
/// assert_eq!(parse_analog_label("A3").unwrap(), 3);
/// assert!(parse_analog_label("B3").is_err());
/// ```
pub fn parse_analog_label(label: &str) -> std::result::Result<u32, Error> {
    let label = label.trim();
    let digits = label
        .strip_prefix('A')
        .or_else(|| label.strip_prefix('a'))
        .ok_or_else(|| Error::InvalidSelector(label.to_string()))?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidSelector(label.to_string()));
    }
    digits
        .parse()
        .map_err(|_| Error::InvalidSelector(label.to_string()))
}
