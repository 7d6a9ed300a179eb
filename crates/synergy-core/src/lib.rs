//! Core pieces shared by the synergy server and client: trust material and tracing setup.

pub mod tracing;
pub mod trust;

pub use tracing::{init_tracing, TracingConfig, TracingError, TracingOutputFormat};
pub use trust::{ServerIdentity, TrustBundle, TrustError};
