//! Message dispatch.
//!
//! Routes each inbound envelope through the registry and produces the reply,
//! if any. Bad input from a client is logged and dropped; it never ends the
//! connection.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use synergy_protocol::{
    DispatchError, Envelope, ProtocolMessage, Registry, SessionJoinAck, SessionJoinRequest,
};

use crate::connection::{Connection, Inbound};
use crate::error::ServerResult;

/// Dispatches envelopes arriving on server connections.
#[derive(Debug, Clone)]
pub struct MessageHandler {
    registry: Arc<Registry>,
}

impl Default for MessageHandler {
    fn default() -> Self {
        Self::new(Arc::new(Registry::with_defaults()))
    }
}

impl MessageHandler {
    /// Creates a handler backed by the given registry.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The registry used for dispatch.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Handles one envelope and returns the reply to send, if any.
    #[tracing::instrument(
        skip(self, envelope),
        fields(message_type = %envelope.message_type, sender_id = envelope.sender_id)
    )]
    pub fn handle(&self, envelope: &Envelope) -> Option<ProtocolMessage> {
        match self.registry.decode(envelope) {
            Ok(ProtocolMessage::JoinSessionRequest(request)) => Some(self.join(&request).into()),
            Ok(ProtocolMessage::JoinSessionAck(_)) => {
                warn!("Ignoring acknowledgement sent by a client");
                None
            }
            Err(DispatchError::UnknownType(e)) => {
                warn!(error = %e, "Unknown message type, ignoring");
                None
            }
            Err(e @ DispatchError::Invalid { .. }) => {
                warn!(error = %e, "Rejected invalid message");
                None
            }
        }
    }

    fn join(&self, request: &SessionJoinRequest) -> SessionJoinAck {
        info!(
            username = request.username(),
            session_id = ?request.target_session_id(),
            create_new = request.create_new(),
            "Session join requested"
        );
        SessionJoinAck::for_request(request)
    }

    /// Serves one secure connection until the peer goes away.
    pub async fn handle_connection<S>(&self, mut conn: Connection<S>) -> ServerResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            match conn.next_inbound().await? {
                Some(Inbound::Envelope(envelope)) => {
                    if let Some(reply) = self.handle(&envelope) {
                        conn.send(&reply).await?;
                    }
                }
                Some(Inbound::Rejected(e)) => {
                    warn!(error = %e, "Rejected malformed envelope");
                }
                None => {
                    debug!("Client disconnected");
                    return Ok(());
                }
            }
        }
    }
}
