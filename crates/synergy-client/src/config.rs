//! Configuration file.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/synergy/config.toml` by default. Command-line flags win over
//! values read here.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:12345"
//! cert = "cert.pem"
//! key = "key.pem"
//!
//! [join]
//! host = "localhost"
//! port = 12345
//! ca_cert = "cert.pem"
//! username = "Client"
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use synergy_server::{ClientOptions, DEFAULT_PORT, ServerConfig};

/// Configuration for the synergy binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Settings for `synergy server`.
    pub server: ServerSettings,

    /// Settings for `synergy join`.
    pub join: JoinSettings,
}

/// Settings for running the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to listen on.
    pub bind: SocketAddr,

    /// PEM certificate chain.
    pub cert: PathBuf,

    /// PEM private key.
    pub key: PathBuf,

    /// TLS handshake timeout in seconds.
    pub handshake_timeout: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            cert: PathBuf::from("cert.pem"),
            key: PathBuf::from("key.pem"),
            handshake_timeout: 10,
        }
    }
}

impl ServerSettings {
    /// Converts to the server crate's configuration.
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig::new(self.bind)
            .with_identity_paths(&self.cert, &self.key)
            .with_handshake_timeout(Duration::from_secs(self.handshake_timeout))
    }
}

/// Settings for joining a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinSettings {
    /// Server host.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// PEM certificate(s) trusted as issuers of the server certificate.
    pub ca_cert: PathBuf,

    /// Name the server certificate must match, when it differs from `host`.
    pub server_name: Option<String>,

    /// Name presented to the server.
    pub username: String,

    /// Connect timeout in seconds.
    pub connect_timeout: u64,

    /// TLS handshake timeout in seconds.
    pub handshake_timeout: u64,
}

impl Default for JoinSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            ca_cert: PathBuf::from("cert.pem"),
            server_name: None,
            username: "Client".to_string(),
            connect_timeout: 5,
            handshake_timeout: 10,
        }
    }
}

impl JoinSettings {
    /// Converts to the dialer's options.
    pub fn to_client_options(&self) -> ClientOptions {
        let options = ClientOptions::new(&self.host, self.port)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout))
            .with_handshake_timeout(Duration::from_secs(self.handshake_timeout));
        match &self.server_name {
            Some(name) => options.with_server_name(name),
            None => options,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {}", path.display(), e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synergy")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server.bind.to_string(), "127.0.0.1:12345");
        assert_eq!(config.server.cert, PathBuf::from("cert.pem"));
        assert_eq!(config.join.host, "localhost");
        assert_eq!(config.join.port, 12345);
        assert_eq!(config.join.username, "Client");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[join]\nhost = \"example.org\"\nusername = \"alice\"\n").unwrap();

        let config = ClientConfig::load_from(&path).unwrap();
        assert_eq!(config.join.host, "example.org");
        assert_eq!(config.join.username, "alice");
        assert_eq!(config.join.port, 12345);
        assert_eq!(config.server.key, PathBuf::from("key.pem"));
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nbind = \"not an address\"\n").unwrap();
        assert!(ClientConfig::load_from(&path).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = ClientConfig::load_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.contains("nope.toml"));
    }

    #[test]
    fn serializes_to_toml() {
        let text = toml::to_string_pretty(&ClientConfig::default()).unwrap();
        assert!(text.contains("[server]"));
        assert!(text.contains("bind = \"127.0.0.1:12345\""));
        let parsed: ClientConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.join.port, 12345);
    }

    #[test]
    fn conversions() {
        let settings = JoinSettings {
            host: "127.0.0.1".into(),
            server_name: Some("localhost".into()),
            connect_timeout: 2,
            ..Default::default()
        };
        let options = settings.to_client_options();
        assert_eq!(options.server_name(), "localhost");
        assert_eq!(options.connect_timeout, Duration::from_secs(2));

        let server = ServerSettings::default().to_server_config();
        assert_eq!(server.handshake_timeout, Duration::from_secs(10));
        assert_eq!(server.key_path, PathBuf::from("key.pem"));
    }

    #[test]
    fn default_path_ends_with_synergy() {
        let path = ClientConfig::default_path();
        assert!(path.ends_with("synergy/config.toml"));
    }
}
