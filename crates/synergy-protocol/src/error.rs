//! Protocol error types.

use thiserror::Error;

use crate::envelope::MessageType;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while framing, encoding or decoding envelopes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Line exceeds the maximum allowed length.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The line is not a well-formed envelope (bad JSON, missing or mistyped field).
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A message refused to serialize its payload.
    #[error("invalid {message_type} message: {source}")]
    Invalid {
        message_type: MessageType,
        #[source]
        source: ValidationError,
    },
}

/// A payload failed the checks of its message type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is absent.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// A field is present but has the wrong JSON kind.
    #[error("field `{field}` must be a {expected}")]
    WrongKind {
        field: &'static str,
        expected: &'static str,
    },

    /// A string field that must carry a value is empty.
    #[error("field `{0}` must not be empty")]
    Empty(&'static str),

    /// Neither a target session nor a request to create one was given.
    #[error("either `session_id` or `create_new: true` is required")]
    MissingIntent,

    /// Both a target session and a request to create one were given.
    #[error("`session_id` and `create_new` are mutually exclusive")]
    AmbiguousIntent,
}

/// Lookup failure in the message type registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No constructor is registered for the tag.
    #[error("unknown message type: {0}")]
    NotFound(String),
}

/// Why an envelope could not be turned into a typed message.
///
/// The two variants are kept apart so operators can tell "don't understand
/// this message" from "understood but invalid".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The envelope's type tag is not registered.
    #[error(transparent)]
    UnknownType(#[from] RegistryError),

    /// The payload failed validation for a known type.
    #[error("invalid {message_type} payload: {source}")]
    Invalid {
        message_type: MessageType,
        #[source]
        source: ValidationError,
    },
}
