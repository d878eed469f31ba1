//! Error types for the chat connection core.
//!
//! [`MessageParseError`] covers a single wire line that violates the minimal
//! grammar. [`ChatError`] is the tagged enumeration surfaced to callers and
//! listeners: parse failures, authentication rejection, command timeouts and
//! rejections, and transport failures.

use thiserror::Error;

/// Convenience type alias for Results using [`ChatError`].
pub type Result<T, E = ChatError> = std::result::Result<T, E>;

/// Top-level errors of the chat connection.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum ChatError {
    /// A wire line could not be tokenized.
    #[error("invalid message: {line}")]
    Parse {
        /// The raw line.
        line: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },

    /// The server rejected the supplied credentials.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A command received no confirmation before its deadline.
    #[error("{command}: timed out")]
    Timeout {
        /// The slash-command that was issued.
        command: String,
    },

    /// The server does not know the slash-command.
    #[error("{command}: unrecognized command")]
    UnrecognizedCommand {
        /// The slash-command that was issued.
        command: String,
    },

    /// A confirmation arrived but its predicate refused it.
    #[error("{command}: {reason}")]
    CommandRejected {
        /// The slash-command that was issued.
        command: String,
        /// Value returned by the predicate.
        reason: String,
    },

    /// The transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The connection was torn down before the operation completed.
    #[error("disconnected")]
    Disconnected,
}

impl ChatError {
    /// Whether this error came from the wire grammar.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    /// Whether this error is a command deadline expiring.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Errors encountered when tokenizing a single wire line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Line was empty.
    #[error("empty message")]
    EmptyMessage,

    /// Command was invalid or missing.
    #[error("invalid command")]
    InvalidCommand,

    /// Parsing error with position and context.
    #[error("parsing failed at position {position}: {context}")]
    ParseContext {
        /// Byte position where parsing failed.
        position: usize,
        /// Description of what was being parsed.
        context: String,
    },
}

/// Errors raised by a transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// Opening the socket failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Writing a line failed.
    #[error("send failed: {0}")]
    Send(String),

    /// The transport is not open.
    #[error("transport closed")]
    Closed,

    /// The peer sent something the transport cannot carry.
    #[error("protocol error: {0}")]
    Protocol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChatError::Timeout {
            command: "ban".to_string(),
        };
        assert_eq!(format!("{}", err), "ban: timed out");

        let err = ChatError::UnrecognizedCommand {
            command: "bann".to_string(),
        };
        assert_eq!(format!("{}", err), "bann: unrecognized command");

        let err = MessageParseError::ParseContext {
            position: 3,
            context: "parsing IRC command".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "parsing failed at position 3: parsing IRC command"
        );
    }

    #[test]
    fn test_parse_error_chaining() {
        let cause = MessageParseError::InvalidCommand;
        let err = ChatError::Parse {
            line: ":".to_string(),
            cause: cause.clone(),
        };

        let source = std::error::Error::source(&err);
        assert!(source.is_some());
        assert_eq!(source.unwrap().to_string(), cause.to_string());
        assert!(err.is_parse());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_transport_conversion() {
        let err: ChatError = TransportError::Closed.into();
        match err {
            ChatError::Transport(TransportError::Closed) => {}
            _ => panic!("Expected Transport variant"),
        }
    }
}
