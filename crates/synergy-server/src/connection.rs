//! A framed, state-tracked connection.
//!
//! The same type serves both roles. The stream is attached only once the
//! TLS handshake has succeeded, so nothing can be written to or read from
//! a connection that is not `Secure`.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

use synergy_protocol::{Envelope, LineFramer, Message, ProtocolError, SenderId, decode, encode_line};

use crate::error::{ServerError, ServerResult};
use crate::state::{ConnectionState, HandshakeFailure, Role, StateMachine, TransportEvent};

const READ_CHUNK: usize = 8 * 1024;

/// One unit of inbound traffic.
#[derive(Debug)]
pub enum Inbound {
    /// A structurally valid envelope.
    Envelope(Envelope),
    /// A line that was not a valid envelope. The connection stays open.
    Rejected(ProtocolError),
}

/// One connection, generic over its byte stream.
#[derive(Debug)]
pub struct Connection<S> {
    machine: StateMachine,
    sender_id: SenderId,
    stream: Option<S>,
    framer: LineFramer,
}

impl<S> Connection<S> {
    /// Creates a connection in `Connecting` with no stream.
    pub fn new(role: Role) -> Self {
        Self {
            machine: StateMachine::new(role),
            sender_id: 0,
            stream: None,
            framer: LineFramer::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    /// Role of this end.
    pub fn role(&self) -> Role {
        self.machine.role()
    }

    /// Identifier stamped on outbound envelopes.
    pub fn sender_id(&self) -> SenderId {
        self.sender_id
    }

    /// Returns true if application data may flow.
    pub fn is_secure(&self) -> bool {
        self.state() == ConnectionState::Secure
    }

    /// The transport is up; the handshake starts now.
    pub fn connected(&mut self, sender_id: SenderId) -> ServerResult<()> {
        self.machine.apply(TransportEvent::Connected)?;
        self.sender_id = sender_id;
        Ok(())
    }

    /// The handshake succeeded; attaches the secured stream.
    pub fn attach(&mut self, stream: S) -> ServerResult<()> {
        self.machine.apply(TransportEvent::HandshakeCompleted)?;
        self.stream = Some(stream);
        Ok(())
    }

    /// The handshake failed. Returns the error to hand back to the caller.
    pub fn handshake_failed(&mut self, failure: HandshakeFailure) -> ServerError {
        if let Err(e) = self
            .machine
            .apply(TransportEvent::HandshakeFailed(failure.clone()))
        {
            return e;
        }
        ServerError::Handshake(failure)
    }

    /// The transport failed outside of the handshake.
    pub fn transport_failed(&mut self, error: io::Error) -> ServerError {
        self.stream = None;
        if !self.state().is_terminal() {
            // Every live state accepts a transport error.
            let _ = self
                .machine
                .apply(TransportEvent::TransportError(error.to_string()));
        }
        ServerError::Io(error)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    /// Sends one message as a single line.
    ///
    /// Fails with [`ServerError::NotReady`] unless the connection is
    /// `Secure`; nothing is queued.
    pub async fn send<M: Message + ?Sized>(&mut self, message: &M) -> ServerResult<()> {
        let state = self.state();
        let Some(stream) = self.stream.as_mut().filter(|_| state == ConnectionState::Secure)
        else {
            return Err(ServerError::NotReady { state });
        };

        let envelope = Envelope::from_message(message, self.sender_id)?;
        let line = encode_line(&envelope)?;

        let written = match stream.write_all(&line).await {
            Ok(()) => stream.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            return Err(self.transport_failed(e));
        }

        debug!(
            message_type = %envelope.message_type,
            sender_id = self.sender_id,
            bytes = line.len(),
            "Sent message"
        );
        Ok(())
    }

    /// Waits for the next inbound line.
    ///
    /// Returns `Ok(None)` once the peer has closed the stream.
    pub async fn next_inbound(&mut self) -> ServerResult<Option<Inbound>> {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some(frame) = self.framer.next_frame() {
                let inbound = match frame.and_then(|line| decode(&line)) {
                    Ok(envelope) => {
                        trace!(
                            message_type = %envelope.message_type,
                            sender_id = envelope.sender_id,
                            "Received envelope"
                        );
                        Inbound::Envelope(envelope)
                    }
                    Err(e) => Inbound::Rejected(e),
                };
                return Ok(Some(inbound));
            }

            let state = self.state();
            let Some(stream) = self.stream.as_mut().filter(|_| state == ConnectionState::Secure)
            else {
                return Err(ServerError::NotReady { state });
            };

            match stream.read(&mut chunk).await {
                Ok(0) => {
                    self.peer_closed();
                    return Ok(None);
                }
                Ok(n) => self.framer.extend(&chunk[..n]),
                // A peer that drops TCP without a TLS close_notify.
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!(error = %e, "Peer closed without close_notify");
                    self.peer_closed();
                    return Ok(None);
                }
                Err(e) => return Err(self.transport_failed(e)),
            }
        }
    }

    /// Shuts the stream down.
    ///
    /// A connection that never became secure ends `Faulted`.
    pub async fn close(&mut self) -> ServerResult<()> {
        if let Some(mut stream) = self.stream.take()
            && let Err(e) = stream.shutdown().await
        {
            debug!(error = %e, "Error during shutdown");
        }
        if !self.state().is_terminal() {
            self.machine.apply(TransportEvent::Closed)?;
        }
        Ok(())
    }

    fn peer_closed(&mut self) {
        if self.framer.buffered() > 0 {
            warn!(
                bytes = self.framer.buffered(),
                "Discarding incomplete line at end of stream"
            );
        }
        self.stream = None;
        let _ = self.machine.apply(TransportEvent::Closed);
    }
}
