//! CLI for synergy
//!
//! This crate provides the `synergy` command-line interface: run the TLS
//! server, or connect to one and join a session.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
