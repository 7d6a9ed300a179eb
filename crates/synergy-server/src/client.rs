//! Client dialer.
//!
//! The client speaks first: as soon as the connection is secure it sends a
//! session-join request, then waits for the acknowledgement. There is no
//! reconnection; a failed attempt is reported to the caller.

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info, warn};

use synergy_core::TrustBundle;
use synergy_protocol::{Message, ProtocolMessage, Registry, SessionJoinAck, SessionJoinRequest};

use crate::config::ClientOptions;
use crate::connection::{Connection, Inbound};
use crate::error::{ServerError, ServerResult};
use crate::state::{HandshakeFailure, Role};

/// Client side of a secured connection.
pub type ClientConnection = Connection<TlsStream<TcpStream>>;

/// Dials the server and completes the TLS handshake.
///
/// The server certificate must be issued by one of the certificates in
/// `trust`. On success the connection is `Secure`.
pub async fn connect(options: &ClientOptions, trust: &TrustBundle) -> ServerResult<SecureClient> {
    let server_name = ServerName::try_from(options.server_name().to_string())
        .map_err(|e| ServerError::config(format!("invalid server name: {e}")))?;
    let connector = TlsConnector::from(trust.client_config()?);

    let mut connection = Connection::new(Role::Client);
    let addr = (options.host.as_str(), options.port);

    let tcp = match tokio::time::timeout(options.connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(tcp)) => tcp,
        Ok(Err(e)) => return Err(connection.transport_failed(e)),
        Err(_) => {
            return Err(connection.transport_failed(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "connect timed out",
            )));
        }
    };

    let sender_id = u64::from(tcp.local_addr()?.port());
    connection.connected(sender_id)?;
    debug!(
        host = %options.host,
        port = options.port,
        sender_id,
        "TCP connected, starting TLS handshake"
    );

    match tokio::time::timeout(
        options.handshake_timeout,
        connector.connect(server_name, tcp),
    )
    .await
    {
        Ok(Ok(tls)) => connection.attach(tls)?,
        Ok(Err(e)) => {
            let failure = HandshakeFailure::from_io(&e);
            warn!(failure = %failure, "TLS handshake failed");
            return Err(connection.handshake_failed(failure));
        }
        Err(_) => return Err(connection.handshake_failed(HandshakeFailure::Timeout)),
    }

    info!(host = %options.host, port = options.port, "Secure connection established");
    Ok(SecureClient {
        connection,
        registry: Registry::with_defaults(),
        reply_timeout: options.reply_timeout,
    })
}

/// A client connection that has completed its handshake.
pub struct SecureClient {
    connection: ClientConnection,
    registry: Registry,
    reply_timeout: std::time::Duration,
}

impl SecureClient {
    /// The underlying connection.
    pub fn connection(&self) -> &ClientConnection {
        &self.connection
    }

    /// Mutable access to the underlying connection.
    pub fn connection_mut(&mut self) -> &mut ClientConnection {
        &mut self.connection
    }

    /// Sends a session-join request and waits for the acknowledgement.
    ///
    /// Lines the client cannot use are logged and skipped while waiting.
    pub async fn join(&mut self, request: &SessionJoinRequest) -> ServerResult<SessionJoinAck> {
        self.connection.send(request).await?;

        let timeout = self.reply_timeout;
        match tokio::time::timeout(timeout, self.await_ack()).await {
            Ok(result) => result,
            Err(_) => Err(ServerError::Timeout {
                operation: "session join acknowledgement",
            }),
        }
    }

    async fn await_ack(&mut self) -> ServerResult<SessionJoinAck> {
        loop {
            let envelope = match self.connection.next_inbound().await? {
                Some(Inbound::Envelope(envelope)) => envelope,
                Some(Inbound::Rejected(e)) => {
                    warn!(error = %e, "Ignoring malformed envelope from server");
                    continue;
                }
                None => return Err(ServerError::ConnectionClosed),
            };

            match self.registry.decode(&envelope) {
                Ok(ProtocolMessage::JoinSessionAck(ack)) => {
                    info!(username = ack.username(), "Session join acknowledged");
                    return Ok(ack);
                }
                Ok(other) => {
                    return Err(ServerError::UnexpectedMessage {
                        message_type: other.message_type(),
                    });
                }
                Err(e) => warn!(error = %e, "Ignoring undecodable message from server"),
            }
        }
    }

    /// Closes the connection.
    pub async fn close(mut self) -> ServerResult<()> {
        self.connection.close().await
    }
}
