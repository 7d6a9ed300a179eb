//! Trust material for TLS connections.
//!
//! A client trusts exactly the certificates it loads into a [`TrustBundle`]:
//! they become the connection's trusted-issuer set, which is how a
//! self-signed server certificate is accepted. There is no switch to ignore
//! verification errors.
//!
//! A server proves its identity with a [`ServerIdentity`] (certificate chain
//! plus private key). Loading either is file I/O only; nothing here touches
//! the network.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::{self, PemObject};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use thiserror::Error;
use tracing::{debug, info};

/// Origin label used for PEM data that did not come from a file.
const IN_MEMORY: &str = "<memory>";

/// Errors raised while loading trust material.
#[derive(Debug, Error)]
pub enum TrustError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The PEM data held no certificate.
    #[error("no certificate found in {origin}")]
    NoCertificates { origin: String },

    /// The PEM data held no private key.
    #[error("no private key found in {origin}")]
    NoPrivateKey { origin: String },

    /// The PEM data could not be parsed.
    #[error("invalid PEM in {origin}: {reason}")]
    InvalidPem { origin: String, reason: String },

    /// A certificate could not be used as a trust anchor.
    #[error("certificate rejected as trusted issuer: {0}")]
    Rejected(String),

    /// rustls refused the resulting configuration (e.g. key does not match).
    #[error("TLS configuration failed: {0}")]
    Tls(#[from] rustls::Error),
}

/// Certificates a client accepts as issuers of the server's certificate.
#[derive(Debug, Clone)]
pub struct TrustBundle {
    certificates: Vec<CertificateDer<'static>>,
    roots: Arc<RootCertStore>,
}

impl TrustBundle {
    /// Loads every certificate in a PEM file.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, TrustError> {
        let path = path.as_ref();
        let data = read_file(path)?;
        let bundle = Self::parse(&data, &path.display().to_string())?;
        info!(
            path = %path.display(),
            certificates = bundle.len(),
            "Loaded trusted issuer certificates"
        );
        Ok(bundle)
    }

    /// Loads every certificate in an in-memory PEM document.
    pub fn from_pem(pem: &[u8]) -> Result<Self, TrustError> {
        Self::parse(pem, IN_MEMORY)
    }

    fn parse(pem: &[u8], origin: &str) -> Result<Self, TrustError> {
        let certificates = parse_certificates(pem, origin)?;

        let mut roots = RootCertStore::empty();
        for cert in &certificates {
            roots
                .add(cert.clone())
                .map_err(|e| TrustError::Rejected(e.to_string()))?;
        }

        Ok(Self {
            certificates,
            roots: Arc::new(roots),
        })
    }

    /// Number of trusted certificates.
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    /// Always false for a successfully loaded bundle.
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// The trusted certificates in DER form.
    pub fn certificates(&self) -> &[CertificateDer<'static>] {
        &self.certificates
    }

    /// Builds the client-side TLS configuration (TLS 1.2 or later).
    pub fn client_config(&self) -> Result<Arc<ClientConfig>, TrustError> {
        let config = ClientConfig::builder_with_provider(crypto_provider())
            .with_safe_default_protocol_versions()?
            .with_root_certificates(self.roots.clone())
            .with_no_client_auth();
        Ok(Arc::new(config))
    }
}

/// Certificate chain and private key a server presents during the handshake.
pub struct ServerIdentity {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl ServerIdentity {
    /// Loads the certificate chain and private key from PEM files.
    pub fn from_pem_files(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<Self, TrustError> {
        let cert_path = cert_path.as_ref();
        let key_path = key_path.as_ref();

        let chain = parse_certificates(&read_file(cert_path)?, &cert_path.display().to_string())?;
        let key = parse_private_key(&read_file(key_path)?, &key_path.display().to_string())?;

        info!(
            cert = %cert_path.display(),
            key = %key_path.display(),
            "Loaded server certificate and private key"
        );
        Ok(Self { chain, key })
    }

    /// Loads the certificate chain and private key from in-memory PEM.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, TrustError> {
        Ok(Self {
            chain: parse_certificates(cert_pem, IN_MEMORY)?,
            key: parse_private_key(key_pem, IN_MEMORY)?,
        })
    }

    /// The certificate chain, leaf first.
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    /// Builds the server-side TLS configuration (TLS 1.2 or later, no client auth).
    pub fn server_config(&self) -> Result<Arc<ServerConfig>, TrustError> {
        let config = ServerConfig::builder_with_provider(crypto_provider())
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(self.chain.clone(), self.key.clone_key())?;
        Ok(Arc::new(config))
    }
}

impl fmt::Debug for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerIdentity")
            .field("chain_len", &self.chain.len())
            .field("key", &"<redacted>")
            .finish()
    }
}

fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn read_file(path: &Path) -> Result<Vec<u8>, TrustError> {
    debug!(path = %path.display(), "Reading trust material");
    fs::read(path).map_err(|source| TrustError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_certificates(
    pem: &[u8],
    origin: &str,
) -> Result<Vec<CertificateDer<'static>>, TrustError> {
    let certificates = CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TrustError::InvalidPem {
            origin: origin.to_string(),
            reason: e.to_string(),
        })?;

    if certificates.is_empty() {
        return Err(TrustError::NoCertificates {
            origin: origin.to_string(),
        });
    }
    Ok(certificates)
}

fn parse_private_key(pem: &[u8], origin: &str) -> Result<PrivateKeyDer<'static>, TrustError> {
    PrivateKeyDer::from_pem_slice(pem).map_err(|e| match e {
        pem::Error::NoItemsFound => TrustError::NoPrivateKey {
            origin: origin.to_string(),
        },
        other => TrustError::InvalidPem {
            origin: origin.to_string(),
            reason: other.to_string(),
        },
    })
}
