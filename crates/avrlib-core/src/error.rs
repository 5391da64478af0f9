//! Error types for avrlib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Connection-level, protocol-level, and
//! caller-input errors are all captured here.

/// The error type for all avrlib operations.
///
/// Every error resolves exactly the command that was in flight when it
/// occurred. Commands queued behind it get their own attempt.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The session to the receiver could not be established.
    ///
    /// Covers refused connections, unresolvable hosts, and connect timeouts.
    #[error("failed to connect: {0}")]
    ConnectionFailed(String),

    /// The session was dropped while a command was in flight.
    #[error("connection lost")]
    ConnectionLost,

    /// A query command got no matching response line before its deadline.
    #[error("response not received in time for {command:?}")]
    ResponseTimeout {
        /// The command text that went unanswered.
        command: String,
    },

    /// No session is available (dispatcher stopped, or transport closed).
    #[error("not connected")]
    NotConnected,

    /// A transport read found no data within its timeout.
    ///
    /// The dispatcher treats this as "nothing more arrived", not as a fault.
    #[error("timeout waiting for data")]
    Timeout,

    /// A response line matched but its payload could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An invalid parameter was passed to a receiver command.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A transport-level error not covered by the variants above.
    #[error("transport error: {0}")]
    Transport(String),

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the session can no longer be used.
    ///
    /// The dispatcher discards its session after any such error so the next
    /// command starts on a fresh connection.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConnectionLost | Error::NotConnected | Error::Transport(_) | Error::Io(_)
        )
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_connection_failed() {
        let e = Error::ConnectionFailed("192.168.1.20:23: connection refused".into());
        assert_eq!(
            e.to_string(),
            "failed to connect: 192.168.1.20:23: connection refused"
        );
    }

    #[test]
    fn error_display_connection_lost() {
        assert_eq!(Error::ConnectionLost.to_string(), "connection lost");
    }

    #[test]
    fn error_display_response_timeout() {
        let e = Error::ResponseTimeout {
            command: "PW?".into(),
        };
        assert_eq!(e.to_string(), "response not received in time for \"PW?\"");
    }

    #[test]
    fn error_display_not_connected() {
        assert_eq!(Error::NotConnected.to_string(), "not connected");
    }

    #[test]
    fn error_display_protocol() {
        let e = Error::Protocol("volume payload \"MAX\" is not numeric".into());
        assert_eq!(
            e.to_string(),
            "protocol error: volume payload \"MAX\" is not numeric"
        );
    }

    #[test]
    fn error_display_invalid_parameter() {
        let e = Error::InvalidParameter("volume 120 outside 0-100".into());
        assert_eq!(e.to_string(), "invalid parameter: volume 120 outside 0-100");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn connection_fatal_classification() {
        assert!(Error::ConnectionLost.is_connection_fatal());
        assert!(Error::NotConnected.is_connection_fatal());
        assert!(Error::Transport("reset".into()).is_connection_fatal());
        assert!(Error::Io(std::io::Error::other("boom")).is_connection_fatal());

        assert!(!Error::Timeout.is_connection_fatal());
        assert!(
            !Error::ResponseTimeout {
                command: "MV?".into()
            }
            .is_connection_fatal()
        );
        assert!(!Error::Protocol("bad".into()).is_connection_fatal());
        assert!(!Error::ConnectionFailed("refused".into()).is_connection_fatal());
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
