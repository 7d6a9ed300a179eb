//! synergy CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::{Level, warn};

use synergy_client::cli::{Cli, Command, ConfigAction};
use synergy_client::commands;
use synergy_client::config::ClientConfig;
use synergy_client::error::{ClientError, ClientResult};
use synergy_core::{TracingConfig, init_tracing};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(tracing_config(&cli)) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn tracing_config(cli: &Cli) -> TracingConfig {
    match &cli.command {
        Command::Server(args) if args.json_logs => TracingConfig::server_json(),
        _ if cli.debug => TracingConfig::cli_debug(),
        Command::Server(_) => TracingConfig::default(),
        _ => TracingConfig::default().with_level(Level::WARN),
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = match cli.config {
        Some(ref path) => ClientConfig::load_from(path).map_err(ClientError::Config)?,
        None => ClientConfig::load().unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring unreadable config file");
            ClientConfig::default()
        }),
    };

    match cli.command {
        Command::Server(ref args) => commands::server::run(args, &config).await,
        Command::Join(ref args) => commands::join::run(args, &config).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Path => commands::config::path(),
        },
    }
}
