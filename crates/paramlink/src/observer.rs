//! Observers of engine notifications, and the operator log.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use paramlink_core::events::Notification;

/// Default number of lines the operator log keeps.
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Receives every [`Notification`] synchronously, from the IO task or from
/// the caller of [`Engine::clear_parameters`](crate::Engine::clear_parameters).
///
/// Implementations must return quickly; async consumers should use
/// [`Engine::subscribe`](crate::Engine::subscribe) instead.
pub trait Observer: Send + Sync {
    fn notify(&self, notification: &Notification);
}

impl<F> Observer for F
where
    F: Fn(&Notification) + Send + Sync,
{
    fn notify(&self, notification: &Notification) {
        self(notification)
    }
}

/// Bounded, human-readable log of everything the engine did.
///
/// Each notification becomes one line; once full, the oldest line is
/// dropped.
#[derive(Debug)]
pub struct LogBuffer {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        LogBuffer {
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY))),
            capacity,
        }
    }

    pub fn push(&self, line: impl Into<String>) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    /// The whole log, one newline-terminated line per entry.
    pub fn text(&self) -> String {
        let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        let mut text = String::new();
        for line in lines.iter() {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl Observer for LogBuffer {
    fn notify(&self, notification: &Notification) {
        self.push(notification.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn log_buffer_formats_notifications() {
        let log = LogBuffer::default();
        log.notify(&Notification::Sent {
            wire: "get:AlladdedParams".into(),
        });
        log.notify(&Notification::Received {
            line: "L,0,gain,0,10,5".into(),
        });
        assert_eq!(
            log.text(),
            "Sending: get:AlladdedParams\nReceived: L,0,gain,0,10,5\n"
        );
    }

    #[test]
    fn log_buffer_evicts_oldest() {
        let log = LogBuffer::new(2);
        log.push("one");
        log.push("two");
        log.push("three");
        assert_eq!(log.lines(), vec!["two", "three"]);
    }

    #[test]
    fn log_buffer_clear() {
        let log = LogBuffer::new(4);
        log.push("x");
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.text(), "");
    }

    #[test]
    fn closures_are_observers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer = move |n: &Notification| sink.lock().unwrap().push(n.to_string());
        observer.notify(&Notification::Cleared);
        assert_eq!(*seen.lock().unwrap(), vec!["Parameter list cleared."]);
    }
}
