//! Join command: connect, send the join request, print the answer.

use std::time::Duration;

use tracing::debug;

use synergy_core::TrustBundle;
use synergy_protocol::{SessionJoinAck, SessionJoinRequest};
use synergy_server::ClientOptions;

use crate::cli::JoinArgs;
use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Joins (or creates) a session and prints the acknowledgement.
///
/// The trust bundle is loaded before any network activity; without it the
/// command fails and nothing is dialed.
pub async fn run(args: &JoinArgs, config: &ClientConfig) -> ClientResult<()> {
    let ca_cert = args
        .ca_cert
        .clone()
        .unwrap_or_else(|| config.join.ca_cert.clone());
    let trust = TrustBundle::from_pem_file(&ca_cert)?;

    let options = client_options(args, config);
    let request = join_request(args, config);
    debug!(host = %options.host, port = options.port, ?request, "Joining");

    let mut client = synergy_server::connect(&options, &trust).await?;
    let ack = client.join(&request).await?;
    println!("{}", describe(&ack));

    client.close().await?;
    Ok(())
}

/// Merges command-line flags over the config file.
pub fn client_options(args: &JoinArgs, config: &ClientConfig) -> ClientOptions {
    let mut settings = config.join.clone();
    if let Some(ref host) = args.host {
        settings.host = host.clone();
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(ref name) = args.server_name {
        settings.server_name = Some(name.clone());
    }

    let options = settings.to_client_options();
    match args.timeout {
        Some(secs) => options.with_connect_timeout(Duration::from_secs(secs)),
        None => options,
    }
}

/// Builds the request.
///
/// `--create-new` always asks for a new session; otherwise `--session`
/// selects the session to join, and without it a new one is requested.
pub fn join_request(args: &JoinArgs, config: &ClientConfig) -> SessionJoinRequest {
    let username = args
        .username
        .clone()
        .unwrap_or_else(|| config.join.username.clone());
    match &args.session {
        Some(session) if !args.create_new => {
            SessionJoinRequest::join(session.clone(), username)
        }
        _ => SessionJoinRequest::create(username),
    }
}

fn describe(ack: &SessionJoinAck) -> String {
    match ack.session_id() {
        Some(session) => format!("joined session {} as {}", session, ack.username()),
        None => format!("created a new session as {}", ack.username()),
    }
}
