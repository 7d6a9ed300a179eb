//! Client error types.

use std::fmt;

use synergy_core::{TracingError, TrustError};
use synergy_server::ServerError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// Trust material missing or unusable.
    Trust(String),
    /// IO error.
    Io(std::io::Error),
    /// Connection to server failed.
    Connection(String),
    /// Protocol/framing error.
    Protocol(String),
    /// Request timed out.
    Timeout(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Trust(msg) => write!(f, "trust error: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Connection(msg) => write!(f, "connection error: {}", msg),
            Self::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Self::Timeout(msg) => write!(f, "timeout: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<TrustError> for ClientError {
    fn from(err: TrustError) -> Self {
        Self::Trust(err.to_string())
    }
}

impl From<TracingError> for ClientError {
    fn from(err: TracingError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<ServerError> for ClientError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Trust(e) => Self::Trust(e.to_string()),
            ServerError::Config { message } => Self::Config(message),
            ServerError::Protocol(e) => Self::Protocol(e.to_string()),
            other @ ServerError::UnexpectedMessage { .. } => Self::Protocol(other.to_string()),
            other @ ServerError::Timeout { .. } => Self::Timeout(other.to_string()),
            other => Self::Connection(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synergy_server::HandshakeFailure;

    #[test]
    fn server_errors_map_to_categories() {
        let err = ClientError::from(ServerError::Handshake(HandshakeFailure::UnknownIssuer));
        assert!(matches!(err, ClientError::Connection(_)));
        assert_eq!(
            err.to_string(),
            "connection error: TLS handshake failed: certificate issuer is not trusted"
        );

        let err = ClientError::from(ServerError::Timeout { operation: "ack" });
        assert!(matches!(err, ClientError::Timeout(_)));

        let err = ClientError::from(ServerError::config("bad name"));
        assert_eq!(err.to_string(), "configuration error: bad name");
    }
}
