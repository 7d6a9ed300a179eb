//! Subcommand implementations.

pub mod config;
pub mod join;
pub mod server;
