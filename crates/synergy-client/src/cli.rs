//! Command-line interface definition.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// synergy - secure session server and client
#[derive(Debug, Parser)]
#[command(name = "synergy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "SYNERGY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the server in the foreground
    Server(ServerArgs),

    /// Connect to a server and join (or create) a session
    Join(JoinArgs),

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options for `synergy server`. Unset values come from the config file.
#[derive(Debug, Default, Args)]
pub struct ServerArgs {
    /// Address to listen on
    #[arg(long, env = "SYNERGY_BIND")]
    pub bind: Option<SocketAddr>,

    /// PEM certificate chain presented to clients
    #[arg(long, env = "SYNERGY_CERT")]
    pub cert: Option<PathBuf>,

    /// PEM private key for the certificate
    #[arg(long, env = "SYNERGY_KEY")]
    pub key: Option<PathBuf>,

    /// TLS handshake timeout in seconds
    #[arg(long)]
    pub handshake_timeout: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

/// Options for `synergy join`. Unset values come from the config file.
#[derive(Debug, Default, Args)]
pub struct JoinArgs {
    /// Server host
    #[arg(long, env = "SYNERGY_HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short, env = "SYNERGY_PORT")]
    pub port: Option<u16>,

    /// PEM certificate(s) trusted as issuers of the server certificate
    #[arg(long, env = "SYNERGY_CA_CERT")]
    pub ca_cert: Option<PathBuf>,

    /// Name the server certificate must match (defaults to the host)
    #[arg(long)]
    pub server_name: Option<String>,

    /// Name to present to the server
    #[arg(long, short)]
    pub username: Option<String>,

    /// Join an existing session
    #[arg(long, conflicts_with = "create_new")]
    pub session: Option<String>,

    /// Create a new session (the default)
    #[arg(long)]
    pub create_new: bool,

    /// Connect timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Show configuration file path
    Path,
}
