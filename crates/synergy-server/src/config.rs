//! Server and client connection configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use synergy_core::{ServerIdentity, TrustError};

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 12345;

/// Default TLS handshake timeout.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: SocketAddr,

    /// Time allowed for a TLS handshake before the connection is dropped.
    pub handshake_timeout: Duration,

    /// PEM file holding the certificate chain.
    pub cert_path: PathBuf,

    /// PEM file holding the private key.
    pub key_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            cert_path: PathBuf::from("cert.pem"),
            key_path: PathBuf::from("key.pem"),
        }
    }
}

impl ServerConfig {
    /// Creates a new server configuration listening on the given address.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Builder: set handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Builder: set certificate and key paths.
    pub fn with_identity_paths(
        mut self,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        self.cert_path = cert_path.into();
        self.key_path = key_path.into();
        self
    }

    /// Loads the certificate and key named by this configuration.
    pub fn load_identity(&self) -> Result<ServerIdentity, TrustError> {
        ServerIdentity::from_pem_files(&self.cert_path, &self.key_path)
    }
}

/// Where and how a client dials.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Host name or address to connect to.
    pub host: String,

    /// TCP port.
    pub port: u16,

    /// Name the server certificate must match. Defaults to `host`.
    pub server_name: Option<String>,

    /// Time allowed for the TCP connect.
    pub connect_timeout: Duration,

    /// Time allowed for the TLS handshake.
    pub handshake_timeout: Duration,

    /// Time allowed for the server to answer a request.
    pub reply_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_PORT)
    }
}

impl ClientOptions {
    /// Creates options for the given host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            server_name: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            reply_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Builder: verify the certificate against this name instead of the host.
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Builder: set connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder: set handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Builder: set reply timeout.
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Name used for certificate verification.
    pub fn server_name(&self) -> &str {
        self.server_name.as_deref().unwrap_or(&self.host)
    }
}
