//! Device status scalars that live outside the parameter registry.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use paramlink_core::types::{PinKind, PinReading};

/// Software name reported before the device announces one.
pub const UNKNOWN_SOFTWARE: &str = "Unknown";

#[derive(Debug)]
struct StatusInner {
    software_name: String,
    last_reading: Option<PinReading>,
    readings: HashMap<(PinKind, String), PinReading>,
}

/// The software name and pin read results last reported by the device.
#[derive(Debug)]
pub struct DeviceStatus {
    inner: RwLock<StatusInner>,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical designator: analog inputs as `A<n>`, digital pins as given.
fn designator_key(kind: PinKind, designator: &str) -> String {
    let designator = designator.trim();
    match kind {
        PinKind::Digital => designator.to_string(),
        PinKind::Analog => {
            let digits = designator
                .strip_prefix(['A', 'a'])
                .unwrap_or(designator);
            format!("A{digits}")
        }
    }
}

impl DeviceStatus {
    pub fn new() -> Self {
        DeviceStatus {
            inner: RwLock::new(StatusInner {
                software_name: UNKNOWN_SOFTWARE.to_string(),
                last_reading: None,
                readings: HashMap::new(),
            }),
        }
    }

    pub fn software_name(&self) -> String {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .software_name
            .clone()
    }

    pub(crate) fn set_software_name(&self, name: &str) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .software_name = name.to_string();
    }

    /// Store a pin read result and return it with its designator normalized.
    pub(crate) fn record_reading(&self, kind: PinKind, designator: &str, value: &str) -> PinReading {
        let reading = PinReading {
            kind,
            designator: designator_key(kind, designator),
            value: value.to_string(),
        };
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner
            .readings
            .insert((kind, reading.designator.clone()), reading.clone());
        inner.last_reading = Some(reading.clone());
        reading
    }

    /// The most recent pin read result of either kind.
    pub fn last_reading(&self) -> Option<PinReading> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_reading
            .clone()
    }

    /// The latest result for one pin. Analog pins may be named `A3` or `3`.
    pub fn reading(&self, kind: PinKind, designator: &str) -> Option<PinReading> {
        let key = (kind, designator_key(kind, designator));
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .readings
            .get(&key)
            .cloned()
    }
}
