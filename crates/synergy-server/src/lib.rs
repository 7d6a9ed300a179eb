//! Secure connection lifecycle for synergy.
//!
//! This crate drives TLS connections in both roles:
//! - a connection state machine (`Connecting` → `HandshakeInProgress` →
//!   `Secure` → `Closed`, or `Faulted`)
//! - a framed [`Connection`] that only carries data once `Secure`
//! - the [`SecureServer`] listener and the [`connect`] dialer
//! - dispatch of inbound envelopes through the message registry
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use synergy_protocol::Registry;
//! use synergy_server::{MessageHandler, SecureServer, ServerConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let identity = config.load_identity()?;
//!     let server = SecureServer::bind(config, &identity).await?;
//!
//!     server.run(MessageHandler::new(Arc::new(Registry::with_defaults()))).await?;
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod connection;
mod error;
mod handler;
mod signals;
mod socket;
mod state;

pub use client::{ClientConnection, SecureClient, connect};
pub use config::{
    ClientOptions, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_PORT, ServerConfig,
};
pub use connection::{Connection, Inbound};
pub use error::{ServerError, ServerResult};
pub use handler::MessageHandler;
pub use signals::{ShutdownSignal, SignalHandler};
pub use socket::{Incoming, SecureServer, ServerConnection};
pub use state::{ConnectionState, HandshakeFailure, Role, StateMachine, TransportEvent};
