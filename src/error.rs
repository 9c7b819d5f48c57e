//! Error types for the Munin client.
//!
//! Every failure carries the node endpoint it happened on, so errors fanned in
//! from many concurrently polled nodes stay attributable.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Coarse classification of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Dial failure, handshake failure, or a command issued while disconnected.
    Connection,
    /// Read/write failure on an established connection.
    Transport,
    /// A line from the node does not have the expected shape.
    Protocol,
    /// The output sink was closed by its consumer.
    Sink,
    /// A caller-imposed deadline elapsed.
    Timeout,
}

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP dial failed or timed out.
    #[error("failed to connect to {node}: {source}")]
    Connect {
        node: String,
        #[source]
        source: std::io::Error,
    },

    /// Welcome banner could not be read.
    #[error("failed to read welcome banner from {node}: {source}")]
    Handshake {
        node: String,
        #[source]
        source: std::io::Error,
    },

    /// A command was issued before `connect` succeeded or after `close`.
    #[error("no connection to {node}")]
    NotConnected { node: String },

    /// Socket read or write failed.
    #[error("i/o error on {node} during `{command}`: {source}")]
    Io {
        node: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Stream ended before the response was complete.
    #[error("response to `{command}` from {node} ended early after {} complete lines", .received.len())]
    Truncated {
        node: String,
        command: String,
        /// Complete lines received before the stream ended.
        received: Vec<String>,
    },

    /// Response line did not parse.
    #[error("unexpected line in `{command}` response from {node}: {line:?}")]
    MalformedLine {
        node: String,
        command: String,
        line: String,
    },

    /// Node answered with a diagnostic such as `# Unknown service`.
    #[error("node {node} reported `{line}` for `{command}`")]
    NodeDiagnostic {
        node: String,
        command: String,
        line: String,
    },

    /// Record or error consumer went away.
    #[error("output sink closed while collecting from {node}")]
    SinkClosed { node: String },

    /// Deadline elapsed.
    #[error("{operation} on {node} timed out")]
    Timeout { node: String, operation: String },
}

impl ClientError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connect { .. } | Self::Handshake { .. } | Self::NotConnected { .. } => {
                ErrorKind::Connection
            }
            Self::Io { .. } | Self::Truncated { .. } => ErrorKind::Transport,
            Self::MalformedLine { .. } | Self::NodeDiagnostic { .. } => ErrorKind::Protocol,
            Self::SinkClosed { .. } => ErrorKind::Sink,
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// The node endpoint (`host:port`) this error originated from.
    pub fn node(&self) -> &str {
        match self {
            Self::Connect { node, .. }
            | Self::Handshake { node, .. }
            | Self::NotConnected { node }
            | Self::Io { node, .. }
            | Self::Truncated { node, .. }
            | Self::MalformedLine { node, .. }
            | Self::NodeDiagnostic { node, .. }
            | Self::SinkClosed { node }
            | Self::Timeout { node, .. } => node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = ClientError::NotConnected {
            node: "localhost:4949".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(err.node(), "localhost:4949");

        let err = ClientError::Truncated {
            node: "localhost:4949".to_string(),
            command: "fetch cpu".to_string(),
            received: vec!["user.value 1".to_string()],
        };
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("after 1 complete lines"));

        let err = ClientError::MalformedLine {
            node: "localhost:4949".to_string(),
            command: "fetch cpu".to_string(),
            line: String::new(),
        };
        assert_eq!(err.kind(), ErrorKind::Protocol);

        let err = ClientError::NodeDiagnostic {
            node: "localhost:4949".to_string(),
            command: "fetch nosuch".to_string(),
            line: "# Unknown service".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("# Unknown service"));
    }
}
