//! Request handlers for a network front end.
//!
//! [`Api`] implements the operations an HTTP service exposes over the
//! engine, without depending on any web framework: request bodies are
//! `serde` types, responses serialize to the JSON shapes clients expect,
//! and failures are [`ApiError`]s with a stable [`kind`](ApiError::kind).
//!
//! | Operation | Request | Response |
//! |---|---|---|
//! | list parameters | | [`ParameterListing`] |
//! | get one parameter | name | [`ParameterListing`] with one entry |
//! | add parameter | [`AddParameterRequest`] | [`CommandAccepted`] |
//! | update parameter | name + [`UpdateParameterRequest`] | [`CommandAccepted`] |
//! | raw command | [`RawCommandRequest`] | [`CommandAccepted`] |
//! | set software name | [`SoftwareRequest`] | [`CommandAccepted`] |
//! | read log | | [`LogResponse`] |
//!
//! Commands are fire-and-forget: a [`CommandAccepted`] means the command
//! was encoded and handed to the IO task, and its `delivered` flag reports
//! whether the write reached the device. Any reply shows up later in the
//! registry.

use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use paramlink_core::error::Error;
use paramlink_core::types::{Command, NewValue, Parameter, PinKind, PinReading};
use paramlink_text_io::io::Dispatcher;

use crate::observer::LogBuffer;
use crate::status::DeviceStatus;
use crate::store::ParameterStore;

/// The `status` text of every accepted command.
pub const COMMAND_SENT: &str = "Command sent";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a request was refused.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Required fields were absent, null, or blank.
    #[error("missing required field(s): {}", .0.join(", "))]
    MissingFields(Vec<String>),

    /// The named parameter is not in the registry.
    #[error("parameter not found: {0}")]
    NotFound(String),

    /// The request was well-formed but cannot become a command.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// The engine is not running.
    #[error("device unavailable: {0}")]
    Unavailable(String),
}

impl ApiError {
    fn missing(fields: &[&str]) -> Self {
        ApiError::MissingFields(fields.iter().map(|f| f.to_string()).collect())
    }

    /// Stable machine-readable identifier, e.g. for choosing a status code.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::MissingFields(_) => "missing_fields",
            ApiError::NotFound(_) => "not_found",
            ApiError::Invalid(_) => "invalid",
            ApiError::Unavailable(_) => "unavailable",
        }
    }

    /// JSON error body: `{"error": "...", "kind": "..."}`.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound(name) => ApiError::NotFound(name),
            Error::Validation(msg) | Error::InvalidSelector(msg) => ApiError::Invalid(msg),
            other => ApiError::Unavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Body of an add-parameter request. Values may be JSON strings, numbers
/// or booleans.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddParameterRequest {
    pub name: Option<Value>,
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub current: Option<Value>,
}

/// Body of an update request. `0` and `false` are valid values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateParameterRequest {
    #[serde(alias = "newValue")]
    pub new_value: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCommandRequest {
    pub command: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SoftwareRequest {
    pub software_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommandAccepted {
    pub status: &'static str,
    /// The wire text written (without terminator).
    pub command: String,
    pub delivered: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LogResponse {
    pub log: String,
}

/// One parameter as returned to clients. Unset fields are `null`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ParameterView {
    pub index: Option<u32>,
    pub min: Option<String>,
    pub max: Option<String>,
    /// A JSON integer when the reported text parses as one, else the text.
    pub current: Option<Value>,
}

impl ParameterView {
    fn new(param: &Parameter, coerce_current: bool) -> Self {
        let current = param.current.as_ref().map(|text| {
            match param.current_as_int().filter(|_| coerce_current) {
                Some(n) => Value::from(n),
                None => Value::String(text.clone()),
            }
        });
        ParameterView {
            index: param.index,
            min: param.min.clone(),
            max: param.max.clone(),
            current,
        }
    }
}

/// Parameters keyed by name, serialized as a JSON object in registry order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterListing {
    entries: Vec<(String, ParameterView)>,
}

impl ParameterListing {
    fn from_params<'a>(params: impl IntoIterator<Item = &'a Parameter>, coerce: bool) -> Self {
        ParameterListing {
            entries: params
                .into_iter()
                .map(|p| (p.name.clone(), ParameterView::new(p, coerce)))
                .collect(),
        }
    }

    pub fn entries(&self) -> &[(String, ParameterView)] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&ParameterView> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, view)| view)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ParameterListing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, view) in &self.entries {
            map.serialize_entry(name, view)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub software_name: String,
    /// e.g. `"Analog Pin A2: 512"`.
    pub last_reading: Option<String>,
}

// ---------------------------------------------------------------------------
// Field conversion
// ---------------------------------------------------------------------------

fn is_blank(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Render a scalar JSON value as command text; booleans become `1`/`0`.
fn scalar_text(field: &str, value: &Value) -> Result<String, ApiError> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(String::from(if *b { "1" } else { "0" })),
        Value::Null => Err(ApiError::missing(&[field])),
        Value::Array(_) | Value::Object(_) => {
            Err(ApiError::Invalid(format!("{field} must be a string, number or boolean")))
        }
    }
}

fn new_value(value: &Value) -> Result<NewValue, ApiError> {
    match value {
        Value::Bool(b) => Ok(NewValue::Bool(*b)),
        // Non-integers keep their JSON spelling, as in `scalar_text`.
        Value::Number(n) => Ok(match n.as_i64() {
            Some(i) => NewValue::Int(i),
            None => NewValue::Text(n.to_string()),
        }),
        other => scalar_text("new_value", other).map(NewValue::Text),
    }
}

fn required_text(field: &str, value: &Option<String>) -> Result<String, ApiError> {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(ApiError::missing(&[field])),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Request handlers sharing one engine's state. Cheap to clone.
#[derive(Clone)]
pub struct Api {
    store: Arc<ParameterStore>,
    status: Arc<DeviceStatus>,
    log: Arc<LogBuffer>,
    dispatcher: Dispatcher,
}

impl Api {
    pub fn new(
        store: Arc<ParameterStore>,
        status: Arc<DeviceStatus>,
        log: Arc<LogBuffer>,
        dispatcher: Dispatcher,
    ) -> Self {
        Api {
            store,
            status,
            log,
            dispatcher,
        }
    }

    /// Every parameter, with `current` coerced to an integer where possible.
    pub fn list_parameters(&self) -> ParameterListing {
        let snapshot = self.store.snapshot();
        ParameterListing::from_params(&snapshot, true)
    }

    /// One parameter, exactly as reported.
    pub fn get_parameter(&self, name: &str) -> Result<ParameterListing, ApiError> {
        let param = self.store.require(name)?;
        Ok(ParameterListing::from_params([&param], false))
    }

    pub fn device_status(&self) -> StatusResponse {
        StatusResponse {
            software_name: self.status.software_name(),
            last_reading: self.status.last_reading().as_ref().map(PinReading::to_string),
        }
    }

    pub fn read_log(&self) -> LogResponse {
        LogResponse {
            log: self.log.text(),
        }
    }

    pub async fn add_parameter(
        &self,
        request: AddParameterRequest,
    ) -> Result<CommandAccepted, ApiError> {
        let fields = [
            ("name", &request.name),
            ("min", &request.min),
            ("max", &request.max),
            ("current", &request.current),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| is_blank(value))
            .map(|(field, _)| *field)
            .collect();
        if !missing.is_empty() {
            return Err(ApiError::missing(&missing));
        }

        let mut text = Vec::with_capacity(fields.len());
        for (field, value) in fields {
            if let Some(value) = value {
                text.push(scalar_text(field, value)?);
            }
        }
        let [name, min, max, current]: [String; 4] = text
            .try_into()
            .map_err(|_| ApiError::missing(&["name", "min", "max", "current"]))?;

        self.submit(Command::AddParam {
            name,
            min,
            max,
            current,
        })
        .await
    }

    pub async fn update_parameter(
        &self,
        name: &str,
        request: UpdateParameterRequest,
    ) -> Result<CommandAccepted, ApiError> {
        if name.trim().is_empty() {
            return Err(ApiError::missing(&["name"]));
        }
        let value = match &request.new_value {
            Some(value) if !is_blank(&request.new_value) => new_value(value)?,
            _ => return Err(ApiError::missing(&["new_value"])),
        };
        self.submit(Command::UpdateParam {
            name: name.to_string(),
            new_value: value,
        })
        .await
    }

    pub async fn send_raw(&self, request: RawCommandRequest) -> Result<CommandAccepted, ApiError> {
        let text = match request.command {
            Some(text) if !text.trim().is_empty() => text,
            _ => return Err(ApiError::missing(&["command"])),
        };
        self.submit(Command::Raw { text }).await
    }

    pub async fn set_software(&self, request: SoftwareRequest) -> Result<CommandAccepted, ApiError> {
        let name = required_text("software_name", &request.software_name)?;
        self.submit(Command::SetSoftware { name }).await
    }

    /// Ask the device to report every parameter it holds.
    pub async fn refresh_parameters(&self) -> Result<CommandAccepted, ApiError> {
        self.submit(Command::ListAllParams).await
    }

    /// Ask the device for one parameter's current value.
    pub async fn request_parameter(&self, name: &str) -> Result<CommandAccepted, ApiError> {
        self.submit(Command::GetParam {
            name: name.to_string(),
        })
        .await
    }

    pub async fn read_pin(
        &self,
        kind: PinKind,
        designator: &str,
    ) -> Result<CommandAccepted, ApiError> {
        self.submit(Command::ReadPin {
            kind,
            designator: designator.to_string(),
        })
        .await
    }

    /// Encode and send any command.
    pub async fn submit(&self, command: Command) -> Result<CommandAccepted, ApiError> {
        let dispatch = self.dispatcher.submit(&command).await?;
        Ok(CommandAccepted {
            status: COMMAND_SENT,
            command: dispatch.wire,
            delivered: dispatch.delivered,
        })
    }
}
