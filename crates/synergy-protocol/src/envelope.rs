//! The envelope shared by every message and its wire encoding.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::Message;

/// Untyped payload document carried by an envelope. Always a JSON object.
pub type Payload = Map<String, Value>;

/// Connection-scoped identifier of the sending side.
///
/// Always a non-negative integer on the wire; negative or fractional ids
/// make the envelope malformed.
pub type SenderId = u64;

/// Protocol revision stamped on every envelope.
///
/// Unrecognized version strings decode to [`ProtocolVersion::Unknown`] so that
/// peers running other revisions degrade gracefully instead of failing decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProtocolVersion {
    /// Version 1.0, the current revision.
    #[default]
    V1_0,
    /// A version string this build does not know, kept verbatim.
    Unknown(String),
}

impl ProtocolVersion {
    /// The version this build speaks.
    pub const CURRENT: Self = Self::V1_0;

    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::V1_0 => "V1_0",
            Self::Unknown(raw) => raw,
        }
    }

    /// Returns true if this is the version this build speaks.
    pub fn is_current(&self) -> bool {
        *self == Self::CURRENT
    }
}

impl From<String> for ProtocolVersion {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "V1_0" => Self::V1_0,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<ProtocolVersion> for String {
    fn from(version: ProtocolVersion) -> Self {
        match version {
            ProtocolVersion::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type tag naming the message carried in an envelope's payload.
///
/// Open for extension: unknown tags decode to [`MessageType::Unknown`] and are
/// rejected at dispatch, not at decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// Client asks to join an existing session or create a new one.
    JoinSessionRequest,
    /// Server acknowledges a join request.
    JoinSessionAck,
    /// A tag this build does not know, kept verbatim.
    Unknown(String),
}

impl MessageType {
    /// Every tag this build knows about.
    pub const KNOWN: [MessageType; 2] = [Self::JoinSessionRequest, Self::JoinSessionAck];

    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::JoinSessionRequest => "JOIN_SESSION_REQUEST",
            Self::JoinSessionAck => "JOIN_SESSION_ACK",
            Self::Unknown(raw) => raw,
        }
    }

    /// Returns true unless this is the unknown sentinel.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<String> for MessageType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "JOIN_SESSION_REQUEST" => Self::JoinSessionRequest,
            "JOIN_SESSION_ACK" => Self::JoinSessionAck,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<&str> for MessageType {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<MessageType> for String {
    fn from(message_type: MessageType) -> Self {
        match message_type {
            MessageType::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common wrapper around every message on the wire.
///
/// ```text
/// {"version":"V1_0","type":"JOIN_SESSION_REQUEST","id":3,"payload":{...}}
/// ```
///
/// Built fresh for each outbound message and decoded fresh for each inbound
/// line; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol revision of the sender.
    pub version: ProtocolVersion,
    /// Type tag of the payload.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Identifier of the sender, scoped to the connection.
    #[serde(rename = "id")]
    pub sender_id: SenderId,
    /// Message fields; validated by the concrete message type, not here.
    pub payload: Payload,
}

impl Envelope {
    /// Wraps a message in an envelope stamped with the current version.
    ///
    /// Fails if the message refuses to serialize its payload.
    pub fn from_message<M: Message + ?Sized>(
        message: &M,
        sender_id: SenderId,
    ) -> ProtocolResult<Self> {
        let message_type = message.message_type();
        let payload = message
            .to_payload()
            .map_err(|source| ProtocolError::Invalid {
                message_type: message_type.clone(),
                source,
            })?;

        Ok(Self {
            version: ProtocolVersion::CURRENT,
            message_type,
            sender_id,
            payload,
        })
    }

    /// Renders the envelope as a compact JSON document (no line terminator).
    pub fn to_bytes(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Checks if this envelope uses the version this build speaks.
    pub fn is_compatible(&self) -> bool {
        self.version.is_current()
    }
}

/// Encodes a message into envelope bytes.
///
/// Nothing is produced when the message's own serialization fails.
pub fn encode<M: Message + ?Sized>(message: &M, sender_id: SenderId) -> ProtocolResult<Vec<u8>> {
    Envelope::from_message(message, sender_id)?.to_bytes()
}

/// Decodes envelope bytes.
///
/// Checks structure only: `version` and `type` must be strings, `id` an
/// unsigned integer and `payload` an object. Unknown version or type strings
/// are kept as sentinels; unknown top-level fields are ignored.
pub fn decode(bytes: &[u8]) -> ProtocolResult<Envelope> {
    Ok(serde_json::from_slice(bytes)?)
}
