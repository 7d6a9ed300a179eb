//! Message envelope, type registry and line framing for synergy.
//!
//! # Wire format
//!
//! Every message travels inside an [`Envelope`], one compact JSON object per
//! line:
//!
//! ```text
//! {"version":"V1_0","type":"JOIN_SESSION_REQUEST","id":1,"payload":{"create_new":true,"username":"Client"}}
//! ```
//!
//! - `version`: protocol revision ([`ProtocolVersion`])
//! - `type`: message tag ([`MessageType`]), resolved through a [`Registry`]
//! - `id`: sender identifier, scoped to the connection
//! - `payload`: message fields, validated by the concrete [`Message`]
//!
//! # Example
//!
//! ```rust
//! use synergy_protocol::{ProtocolMessage, Registry, SessionJoinRequest, decode, encode};
//!
//! let bytes = encode(&SessionJoinRequest::create("Client"), 1).unwrap();
//! let envelope = decode(&bytes).unwrap();
//! let message = Registry::with_defaults().decode(&envelope).unwrap();
//! assert_eq!(message, ProtocolMessage::from(SessionJoinRequest::create("Client")));
//! ```

mod envelope;
mod error;
mod framing;
mod message;
mod registry;
mod session;

pub use envelope::{Envelope, MessageType, Payload, ProtocolVersion, SenderId, decode, encode};
pub use error::{DispatchError, ProtocolError, ProtocolResult, RegistryError, ValidationError};
pub use framing::{LineFramer, encode_line};
pub use message::{Message, ProtocolMessage};
pub use registry::{Constructor, Registry, RegistryBuilder};
pub use session::{SessionJoinAck, SessionJoinRequest};

/// Maximum length of one line on the wire (1 MiB), terminator excluded.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;
