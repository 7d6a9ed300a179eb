//! The message capability and the sum type over every known message kind.

use serde_json::Value;

use crate::envelope::{MessageType, Payload};
use crate::error::ValidationError;
use crate::session::{SessionJoinAck, SessionJoinRequest};

/// A typed message that can live inside an [`Envelope`](crate::Envelope).
///
/// Implementors validate their own payload: `to_payload` refuses to emit an
/// ambiguous or incomplete document, and `load_payload` leaves `self`
/// untouched unless every check passes.
pub trait Message {
    /// Type tag written into the envelope.
    fn message_type(&self) -> MessageType;

    /// Serializes the message fields into a payload document.
    fn to_payload(&self) -> Result<Payload, ValidationError>;

    /// Populates the message from a payload document.
    fn load_payload(&mut self, payload: &Payload) -> Result<(), ValidationError>;
}

/// Every message kind this build understands.
///
/// Values are produced empty by the [`Registry`](crate::Registry) and then
/// populated from a decoded payload. The dispatcher owns the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMessage {
    /// `JOIN_SESSION_REQUEST`
    JoinSessionRequest(SessionJoinRequest),
    /// `JOIN_SESSION_ACK`
    JoinSessionAck(SessionJoinAck),
}

impl ProtocolMessage {
    /// Empty `JOIN_SESSION_REQUEST`, used as a registry constructor.
    pub fn empty_join_request() -> Self {
        Self::JoinSessionRequest(SessionJoinRequest::default())
    }

    /// Empty `JOIN_SESSION_ACK`, used as a registry constructor.
    pub fn empty_join_ack() -> Self {
        Self::JoinSessionAck(SessionJoinAck::default())
    }
}

impl Message for ProtocolMessage {
    fn message_type(&self) -> MessageType {
        match self {
            Self::JoinSessionRequest(m) => m.message_type(),
            Self::JoinSessionAck(m) => m.message_type(),
        }
    }

    fn to_payload(&self) -> Result<Payload, ValidationError> {
        match self {
            Self::JoinSessionRequest(m) => m.to_payload(),
            Self::JoinSessionAck(m) => m.to_payload(),
        }
    }

    fn load_payload(&mut self, payload: &Payload) -> Result<(), ValidationError> {
        match self {
            Self::JoinSessionRequest(m) => m.load_payload(payload),
            Self::JoinSessionAck(m) => m.load_payload(payload),
        }
    }
}

impl From<SessionJoinRequest> for ProtocolMessage {
    fn from(message: SessionJoinRequest) -> Self {
        Self::JoinSessionRequest(message)
    }
}

impl From<SessionJoinAck> for ProtocolMessage {
    fn from(message: SessionJoinAck) -> Self {
        Self::JoinSessionAck(message)
    }
}

/// Required, non-empty string field.
pub(crate) fn required_str<'a>(
    payload: &'a Payload,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    match payload.get(field) {
        None => Err(ValidationError::MissingField(field)),
        Some(Value::String(s)) if s.is_empty() => Err(ValidationError::Empty(field)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ValidationError::WrongKind {
            field,
            expected: "string",
        }),
    }
}

/// Optional string field; present but not a string is an error.
pub(crate) fn optional_str<'a>(
    payload: &'a Payload,
    field: &'static str,
) -> Result<Option<&'a str>, ValidationError> {
    match payload.get(field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ValidationError::WrongKind {
            field,
            expected: "string",
        }),
    }
}

/// Optional boolean field; present but not a boolean is an error.
pub(crate) fn optional_bool(
    payload: &Payload,
    field: &'static str,
) -> Result<Option<bool>, ValidationError> {
    match payload.get(field) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(ValidationError::WrongKind {
            field,
            expected: "boolean",
        }),
    }
}
