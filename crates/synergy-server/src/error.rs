//! Connection and server error types.

use std::io;
use thiserror::Error;

use synergy_core::TrustError;
use synergy_protocol::{MessageType, ProtocolError};

use crate::state::{ConnectionState, HandshakeFailure, TransportEvent};

/// Result type for connection and server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur on a connection or in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error (socket, TLS stream).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Protocol error (framing, encoding).
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Trust material could not be loaded or used.
    #[error("Trust error: {0}")]
    Trust(#[from] TrustError),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Application data was offered before the connection was secure.
    #[error("Connection not ready: state is {state}")]
    NotReady { state: ConnectionState },

    /// The TLS handshake did not complete.
    #[error("TLS handshake failed: {0}")]
    Handshake(HandshakeFailure),

    /// An event arrived that the current state does not accept.
    #[error("Invalid transition: {event} in state {from}")]
    InvalidTransition {
        from: ConnectionState,
        event: TransportEvent,
    },

    /// The peer closed the connection before answering.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// The peer answered with a message we did not expect.
    #[error("Unexpected {message_type} message")]
    UnexpectedMessage { message_type: MessageType },

    /// No answer arrived in time.
    #[error("Timed out waiting for {operation}")]
    Timeout { operation: &'static str },
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
