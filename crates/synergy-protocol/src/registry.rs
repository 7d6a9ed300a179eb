//! Message type registry.
//!
//! Maps a wire type tag to a constructor producing an empty message of that
//! kind. Built once with [`RegistryBuilder`], then frozen and shared
//! read-only between connections.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::envelope::{Envelope, MessageType};
use crate::error::{DispatchError, RegistryError};
use crate::message::{Message, ProtocolMessage};

/// Produces an empty message ready to be populated from a payload.
pub type Constructor = fn() -> ProtocolMessage;

/// Mutable stage of a [`Registry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    constructors: HashMap<String, Constructor>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor for a type tag.
    ///
    /// Registering the same tag again replaces the previous constructor.
    #[must_use]
    pub fn register(mut self, message_type: MessageType, constructor: Constructor) -> Self {
        let tag = String::from(message_type);
        if self.constructors.insert(tag.clone(), constructor).is_some() {
            debug!(message_type = %tag, "Replaced registered constructor");
        }
        self
    }

    /// Freezes the registry.
    pub fn build(self) -> Registry {
        Registry {
            constructors: self.constructors,
        }
    }
}

/// Frozen mapping from type tag to constructor.
#[derive(Debug, Clone)]
pub struct Registry {
    constructors: HashMap<String, Constructor>,
}

impl Registry {
    /// Starts an empty registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registry holding every message kind this build knows.
    pub fn with_defaults() -> Self {
        Self::builder()
            .register(
                MessageType::JoinSessionRequest,
                ProtocolMessage::empty_join_request,
            )
            .register(MessageType::JoinSessionAck, ProtocolMessage::empty_join_ack)
            .build()
    }

    /// Looks up the constructor for a wire tag. There is no fallback.
    pub fn resolve(&self, tag: &str) -> Result<Constructor, RegistryError> {
        self.constructors
            .get(tag)
            .copied()
            .ok_or_else(|| RegistryError::NotFound(tag.to_string()))
    }

    /// Returns true if a constructor is registered for the tag.
    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Number of registered tags.
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Turns a decoded envelope into a typed, validated message.
    ///
    /// An envelope from another protocol revision is handled as the current
    /// one, with a warning.
    pub fn decode(&self, envelope: &Envelope) -> Result<ProtocolMessage, DispatchError> {
        if !envelope.is_compatible() {
            warn!(
                version = %envelope.version,
                sender_id = envelope.sender_id,
                "Unknown protocol version, handling as current"
            );
        }

        let constructor = self.resolve(envelope.message_type.as_str())?;
        let mut message = constructor();
        message
            .load_payload(&envelope.payload)
            .map_err(|source| DispatchError::Invalid {
                message_type: envelope.message_type.clone(),
                source,
            })?;
        Ok(message)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
