//! Error types for paramlink.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport failures, command validation
//! failures, and lookup misses are all captured here.
//!
//! A line that matches no decode rule is *not* an error: it decodes to
//! [`Event::Unrecognized`](crate::events::Event::Unrecognized) and is only
//! logged.

/// The error type for all paramlink operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port open, write, or read failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// A bounded transport read or write did not complete in time.
    #[error("timeout waiting for transport")]
    Timeout,

    /// No connection to the device has been established, or the engine
    /// has already been shut down.
    #[error("not connected")]
    NotConnected,

    /// The connection to the device was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// A command was missing required fields or carried values that cannot
    /// be framed on the wire. Never reaches the transport.
    #[error("validation error: {0}")]
    Validation(String),

    /// A pin designator could not be interpreted (e.g. `"B3"` for an analog
    /// pin, which must be labelled `A<n>`).
    #[error("invalid pin selector: {0}")]
    InvalidSelector(String),

    /// A named parameter is not present in the registry.
    #[error("parameter not found: {0}")]
    NotFound(String),

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a [`Error::Validation`] naming every missing field.
    ///
    /// ```
    /// use paramlink_core::Error;
    ///
    /// let e = Error::missing_fields(&["min", "max"]);
    /// assert_eq!(e.to_string(), "validation error: missing required field(s): min, max");
    /// ```
    pub fn missing_fields(fields: &[&str]) -> Self {
        Error::Validation(format!("missing required field(s): {}", fields.join(", ")))
    }

    /// Whether this error originated on the transport (taxonomy class (a)).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_)
                | Error::Timeout
                | Error::NotConnected
                | Error::ConnectionLost
                | Error::Io(_)
        )
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("port busy".into());
        assert_eq!(e.to_string(), "transport error: port busy");
    }

    #[test]
    fn error_display_timeout() {
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for transport");
    }

    #[test]
    fn error_display_validation() {
        let e = Error::Validation("name must not contain ','".into());
        assert_eq!(e.to_string(), "validation error: name must not contain ','");
    }

    #[test]
    fn error_display_invalid_selector() {
        let e = Error::InvalidSelector("B3".into());
        assert_eq!(e.to_string(), "invalid pin selector: B3");
    }

    #[test]
    fn error_display_not_found() {
        let e = Error::NotFound("gain".into());
        assert_eq!(e.to_string(), "parameter not found: gain");
    }

    #[test]
    fn missing_fields_lists_all_names() {
        let e = Error::missing_fields(&["name", "current"]);
        assert!(matches!(e, Error::Validation(_)));
        assert_eq!(
            e.to_string(),
            "validation error: missing required field(s): name, current"
        );
    }

    #[test]
    fn transport_classification() {
        assert!(Error::Timeout.is_transport());
        assert!(Error::ConnectionLost.is_transport());
        assert!(Error::Transport("x".into()).is_transport());
        assert!(!Error::Validation("x".into()).is_transport());
        assert!(!Error::InvalidSelector("x".into()).is_transport());
        assert!(!Error::NotFound("x".into()).is_transport());
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<Error>();
    }
}
