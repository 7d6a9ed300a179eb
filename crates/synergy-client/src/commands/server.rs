//! Server command: serves sessions in the foreground.
//!
//! Startup order matters: the certificate and key are loaded before the
//! listener binds, so a server with broken trust material never accepts a
//! connection.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use synergy_protocol::Registry;
use synergy_server::{MessageHandler, SecureServer, ServerConfig, SignalHandler};

use crate::cli::ServerArgs;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Runs the server until SIGINT or SIGTERM.
pub async fn run(args: &ServerArgs, config: &ClientConfig) -> ClientResult<()> {
    let server_config = server_config(args, config);

    // 1. Trust material (fatal if missing or invalid)
    let identity = server_config.load_identity()?;

    // 2. Signal handler
    let signal_handler = SignalHandler::new();
    signal_handler.spawn_listener()?;

    // 3. Message registry, shared read-only by every connection
    let registry = Arc::new(Registry::with_defaults());
    info!(message_types = registry.len(), "Message registry ready");

    // 4. Listener
    let server = SecureServer::bind(server_config, &identity)
        .await
        .map_err(|e| ClientError::Config(format!("failed to start server: {}", e)))?;

    let handler = MessageHandler::new(registry);
    server
        .run_until_shutdown(handler, signal_handler.shutdown().wait())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Merges command-line flags over the config file.
pub fn server_config(args: &ServerArgs, config: &ClientConfig) -> ServerConfig {
    let mut server = config.server.to_server_config();
    if let Some(bind) = args.bind {
        server.bind_addr = bind;
    }
    if let Some(ref cert) = args.cert {
        server.cert_path = cert.clone();
    }
    if let Some(ref key) = args.key {
        server.key_path = key.clone();
    }
    if let Some(secs) = args.handshake_timeout {
        server.handshake_timeout = Duration::from_secs(secs);
    }
    server
}
