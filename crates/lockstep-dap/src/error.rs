//! DAP error types.

use thiserror::Error;

use crate::protocol::Message;

/// Errors from DAP client operations.
#[derive(Debug, Error)]
pub enum DapError {
    /// Could not establish the connection to the adapter.
    #[error("failed to connect to adapter at {addr}: {source}")]
    Connect {
        /// The address that was dialed.
        addr: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Transport-level read or write failure on an established connection.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed wire framing (truncated or invalid header/payload).
    #[error("framing error: {0}")]
    Framing(String),

    /// A structurally valid frame whose message type is not recognized.
    #[error("decode error: {0}")]
    Decode(String),

    /// A message of the wrong runtime type arrived where a specific
    /// response or event was awaited.
    #[error("expected {expected}, received {actual:?}")]
    UnexpectedMessage {
        /// What the caller was waiting for (e.g. "launch response").
        expected: String,
        /// The message that actually arrived.
        actual: Box<Message>,
    },

    /// The adapter answered a request with `success = false`.
    #[error("adapter rejected '{command}' request: {message}")]
    Rejected {
        /// The command that was rejected.
        command: String,
        /// The rejection message from the adapter.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Event;

    #[test]
    fn error_connect_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = DapError::Connect {
            addr: "localhost:59000".into(),
            source: io_err,
        };
        assert!(err.to_string().contains("localhost:59000"));
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn error_transport_display() {
        let err = DapError::Transport("connection reset".into());
        assert_eq!(err.to_string(), "transport error: connection reset");
    }

    #[test]
    fn error_framing_display() {
        let err = DapError::Framing("missing Content-Length header".into());
        assert_eq!(
            err.to_string(),
            "framing error: missing Content-Length header"
        );
    }

    #[test]
    fn error_decode_display() {
        let err = DapError::Decode("unknown message type 'banana'".into());
        assert!(err.to_string().contains("banana"));
    }

    #[test]
    fn error_unexpected_message_carries_actual() {
        let actual = Message::Event(Event {
            seq: 7,
            message_type: "event".into(),
            event: "output".into(),
            body: None,
        });
        let err = DapError::UnexpectedMessage {
            expected: "stopped event".into(),
            actual: Box::new(actual),
        };
        let msg = err.to_string();
        assert!(msg.contains("stopped event"));
        assert!(msg.contains("output"));
    }

    #[test]
    fn error_rejected_display() {
        let err = DapError::Rejected {
            command: "launch".into(),
            message: "program not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "adapter rejected 'launch' request: program not found"
        );
    }
}
