//! TLS listener.
//!
//! Accepting only takes the TCP connection; the TLS handshake runs in the
//! connection's own task so a slow or hostile peer never holds up `accept`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;
use tracing::{Instrument, debug, error, info, info_span, warn};

use synergy_core::ServerIdentity;

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::ServerResult;
use crate::handler::MessageHandler;
use crate::state::{HandshakeFailure, Role};

/// Server side of a secured connection.
pub type ServerConnection = Connection<TlsStream<TcpStream>>;

/// TLS listener handing out secured connections.
pub struct SecureServer {
    config: ServerConfig,
    listener: TcpListener,
    acceptor: TlsAcceptor,
    next_sender_id: AtomicU64,
}

impl SecureServer {
    /// Binds the listener.
    ///
    /// The identity is turned into a TLS configuration first, so a bad
    /// certificate or key fails here without ever listening.
    pub async fn bind(config: ServerConfig, identity: &ServerIdentity) -> ServerResult<Self> {
        let acceptor = TlsAcceptor::from(identity.server_config()?);

        let listener = TcpListener::bind(config.bind_addr).await?;
        info!(addr = %listener.local_addr()?, "Server listening");

        Ok(Self {
            config,
            listener,
            acceptor,
            next_sender_id: AtomicU64::new(1),
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts one TCP connection. The handshake has not started yet.
    pub async fn accept(&self) -> ServerResult<Incoming> {
        let (stream, peer) = self.listener.accept().await?;
        let sender_id = self.next_sender_id.fetch_add(1, Ordering::Relaxed);
        debug!(peer = %peer, sender_id, "Accepted TCP connection");

        let mut connection = Connection::new(Role::Server);
        connection.connected(sender_id)?;

        Ok(Incoming {
            stream,
            peer,
            connection,
            acceptor: self.acceptor.clone(),
            timeout: self.config.handshake_timeout,
        })
    }

    /// Runs the accept loop, serving each connection in its own task.
    pub async fn run(&self, handler: MessageHandler) -> ServerResult<()> {
        loop {
            match self.accept().await {
                Ok(incoming) => {
                    let handler = handler.clone();
                    let span = info_span!("connection", peer = %incoming.peer_addr());
                    tokio::spawn(
                        async move {
                            let connection = match incoming.handshake().await {
                                Ok(connection) => connection,
                                Err(e) => {
                                    warn!(error = %e, "Dropping connection");
                                    return;
                                }
                            };
                            if let Err(e) = handler.handle_connection(connection).await {
                                warn!(error = %e, "Connection handler error");
                            }
                        }
                        .instrument(span),
                    );
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    // Continue accepting despite errors
                }
            }
        }
    }

    /// Runs the accept loop until the shutdown future completes.
    pub async fn run_until_shutdown<S>(&self, handler: MessageHandler, shutdown: S) -> ServerResult<()>
    where
        S: std::future::Future<Output = ()>,
    {
        tokio::select! {
            result = self.run(handler) => result,
            _ = shutdown => {
                info!("Shutdown signal received");
                Ok(())
            }
        }
    }
}

/// A TCP connection waiting for its TLS handshake.
pub struct Incoming {
    stream: TcpStream,
    peer: SocketAddr,
    connection: ServerConnection,
    acceptor: TlsAcceptor,
    timeout: Duration,
}

impl Incoming {
    /// Address of the peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Runs the TLS handshake.
    ///
    /// Returns a `Secure` connection, or the reason the handshake failed.
    pub async fn handshake(self) -> ServerResult<ServerConnection> {
        let Self {
            stream,
            peer,
            mut connection,
            acceptor,
            timeout,
        } = self;

        match tokio::time::timeout(timeout, acceptor.accept(stream)).await {
            Ok(Ok(tls)) => {
                connection.attach(tls)?;
                info!(peer = %peer, sender_id = connection.sender_id(), "Secure connection established");
                Ok(connection)
            }
            Ok(Err(e)) => {
                let failure = HandshakeFailure::from_io(&e);
                warn!(peer = %peer, failure = %failure, "TLS handshake failed");
                Err(connection.handshake_failed(failure))
            }
            Err(_) => {
                warn!(peer = %peer, timeout_ms = timeout.as_millis() as u64, "TLS handshake timed out");
                Err(connection.handshake_failed(HandshakeFailure::Timeout))
            }
        }
    }
}
