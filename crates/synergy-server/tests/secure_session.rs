//! End-to-end tests over real TLS on loopback.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use synergy_core::{ServerIdentity, TrustBundle};
use synergy_protocol::{MessageType, Registry, SessionJoinRequest, decode};
use synergy_server::{
    ClientOptions, ConnectionState, HandshakeFailure, MessageHandler, SecureServer, ServerConfig,
    ServerError, connect,
};

struct Fixture {
    _dir: TempDir,
    port: u16,
    trust: TrustBundle,
}

fn write_self_signed(dir: &Path, name: &str) -> (std::path::PathBuf, std::path::PathBuf) {
    write_certificate(dir, name, |_| {})
}

/// Self-signed certificate for `localhost` whose subject is `name`, so two
/// certificates never share an issuer name.
fn write_certificate(
    dir: &Path,
    name: &str,
    customize: impl FnOnce(&mut rcgen::CertificateParams),
) -> (std::path::PathBuf, std::path::PathBuf) {
    let mut params = rcgen::CertificateParams::new(vec!["localhost".to_string()]).unwrap();
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, format!("synergy test {name}"));
    customize(&mut params);
    let key_pair = rcgen::KeyPair::generate().unwrap();
    let cert = params.self_signed(&key_pair).unwrap();

    let cert_path = dir.join(format!("{name}-cert.pem"));
    let key_path = dir.join(format!("{name}-key.pem"));
    std::fs::write(&cert_path, cert.pem()).unwrap();
    std::fs::write(&key_path, key_pair.serialize_pem()).unwrap();
    (cert_path, key_path)
}

async fn start_server() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let (cert_path, key_path) = write_self_signed(dir.path(), "server");

    let config = ServerConfig::new("127.0.0.1:0".parse().unwrap())
        .with_identity_paths(&cert_path, &key_path)
        .with_handshake_timeout(Duration::from_secs(5));
    let identity = config.load_identity().unwrap();
    let server = SecureServer::bind(config, &identity).await.unwrap();
    let port = server.local_addr().unwrap().port();

    let handler = MessageHandler::new(Arc::new(Registry::with_defaults()));
    tokio::spawn(async move { server.run(handler).await });

    Fixture {
        trust: TrustBundle::from_pem_file(&cert_path).unwrap(),
        _dir: dir,
        port,
    }
}

fn options(port: u16) -> ClientOptions {
    ClientOptions::new("127.0.0.1", port)
        .with_server_name("localhost")
        .with_reply_timeout(Duration::from_secs(5))
}

async fn raw_tls(fixture: &Fixture) -> TlsStream<TcpStream> {
    let connector = TlsConnector::from(fixture.trust.client_config().unwrap());
    let tcp = TcpStream::connect(("127.0.0.1", fixture.port)).await.unwrap();
    connector
        .connect("localhost".try_into().unwrap(), tcp)
        .await
        .unwrap()
}

#[tokio::test]
async fn join_is_acknowledged() {
    let fixture = start_server().await;

    let mut client = connect(&options(fixture.port), &fixture.trust)
        .await
        .unwrap();
    assert_eq!(client.connection().state(), ConnectionState::Secure);

    let ack = client
        .join(&SessionJoinRequest::create("Client"))
        .await
        .unwrap();
    assert_eq!(ack.username(), "Client");
    assert_eq!(ack.session_id(), None);

    client.close().await.unwrap();
}

#[tokio::test]
async fn join_existing_session_echoes_id() {
    let fixture = start_server().await;

    let mut client = connect(&options(fixture.port), &fixture.trust)
        .await
        .unwrap();
    let ack = client
        .join(&SessionJoinRequest::join("room-7", "Client"))
        .await
        .unwrap();
    assert_eq!(ack.session_id(), Some("room-7"));
}

#[tokio::test]
async fn untrusted_certificate_never_reaches_secure() {
    let fixture = start_server().await;

    let other = tempfile::tempdir().unwrap();
    let (other_cert, _) = write_self_signed(other.path(), "other");
    let wrong_trust = TrustBundle::from_pem_file(&other_cert).unwrap();

    let result = connect(&options(fixture.port), &wrong_trust).await;
    assert!(matches!(
        result,
        Err(ServerError::Handshake(HandshakeFailure::UnknownIssuer))
    ));

    // The server keeps serving trusted clients.
    let mut client = connect(&options(fixture.port), &fixture.trust)
        .await
        .unwrap();
    let ack = client
        .join(&SessionJoinRequest::create("Client"))
        .await
        .unwrap();
    assert_eq!(ack.username(), "Client");
}

#[tokio::test]
async fn server_side_handshake_fails_for_untrusting_client() {
    let dir = tempfile::tempdir().unwrap();
    let (cert_path, key_path) = write_self_signed(dir.path(), "server");
    let (other_cert, _) = write_self_signed(dir.path(), "other");

    let identity = ServerIdentity::from_pem_files(&cert_path, &key_path).unwrap();
    let server = SecureServer::bind(ServerConfig::new("127.0.0.1:0".parse().unwrap()), &identity)
        .await
        .unwrap();
    let port = server.local_addr().unwrap().port();

    let wrong_trust = TrustBundle::from_pem_file(&other_cert).unwrap();
    let client = tokio::spawn(async move { connect(&options(port), &wrong_trust).await });

    let incoming = server.accept().await.unwrap();
    let result = incoming.handshake().await;
    assert!(result.is_err());
    assert!(client.await.unwrap().is_err());
}

#[tokio::test]
async fn name_mismatch_is_rejected() {
    let fixture = start_server().await;

    let options = ClientOptions::new("127.0.0.1", fixture.port).with_server_name("example.org");
    let result = connect(&options, &fixture.trust).await;
    assert!(matches!(
        result,
        Err(ServerError::Handshake(HandshakeFailure::NameMismatch))
    ));
}

#[tokio::test]
async fn expired_certificate_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (cert_path, key_path) = write_certificate(dir.path(), "expired", |params| {
        params.not_before = rcgen::date_time_ymd(2000, 1, 1);
        params.not_after = rcgen::date_time_ymd(2001, 1, 1);
    });

    let identity = ServerIdentity::from_pem_files(&cert_path, &key_path).unwrap();
    let server = SecureServer::bind(ServerConfig::new("127.0.0.1:0".parse().unwrap()), &identity)
        .await
        .unwrap();
    let port = server.local_addr().unwrap().port();
    let handler = MessageHandler::new(Arc::new(Registry::with_defaults()));
    tokio::spawn(async move { server.run(handler).await });

    let trust = TrustBundle::from_pem_file(&cert_path).unwrap();
    let result = connect(&options(port), &trust).await;
    assert!(matches!(
        result,
        Err(ServerError::Handshake(HandshakeFailure::Expired))
    ));
}

#[tokio::test]
async fn bad_lines_get_no_response_and_connection_stays_open() {
    let fixture = start_server().await;
    let tls = raw_tls(&fixture).await;
    let (read_half, mut write_half) = tokio::io::split(tls);

    // Missing payload, unknown type, both intents, then a valid request.
    write_half
        .write_all(b"{\"version\":\"V1_0\",\"type\":\"JOIN_SESSION_REQUEST\",\"id\":1}\n")
        .await
        .unwrap();
    write_half
        .write_all(b"{\"version\":\"V1_0\",\"type\":\"TEXT_EDIT\",\"id\":1,\"payload\":{}}\n")
        .await
        .unwrap();
    write_half
        .write_all(b"{\"version\":\"V1_0\",\"type\":\"JOIN_SESSION_REQUEST\",\"id\":1,\"payload\":{\"session_id\":\"a\",\"create_new\":true,\"username\":\"First\"}}\n")
        .await
        .unwrap();
    write_half
        .write_all(b"{\"version\":\"V1_0\",\"type\":\"JOIN_SESSION_REQUEST\",\"id\":1,\"payload\":{\"create_new\":true,\"username\":\"Second\"}}\n")
        .await
        .unwrap();
    write_half.flush().await.unwrap();

    let mut lines = BufReader::new(read_half).lines();
    let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let reply = decode(line.as_bytes()).unwrap();
    assert_eq!(reply.message_type, MessageType::JoinSessionAck);
    assert_eq!(reply.payload["username"], "Second");
}

#[tokio::test]
async fn request_split_across_writes_is_answered() {
    let fixture = start_server().await;
    let tls = raw_tls(&fixture).await;
    let (read_half, mut write_half) = tokio::io::split(tls);

    let line = b"{\"version\":\"V1_0\",\"type\":\"JOIN_SESSION_REQUEST\",\"id\":1,\"payload\":{\"create_new\":true,\"username\":\"Client\"}}\r\n";
    for chunk in line.chunks(16) {
        write_half.write_all(chunk).await.unwrap();
        write_half.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let mut lines = BufReader::new(read_half).lines();
    let reply = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let reply = decode(reply.as_bytes()).unwrap();
    assert_eq!(reply.payload["username"], "Client");
}

#[tokio::test]
async fn connect_to_closed_port_faults() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let (cert_path, _) = write_self_signed(dir.path(), "server");
    let trust = TrustBundle::from_pem_file(&cert_path).unwrap();

    let result = connect(&options(port), &trust).await;
    assert!(matches!(result, Err(ServerError::Io(_))));
}

#[tokio::test]
async fn missing_identity_prevents_bind() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig::new("127.0.0.1:0".parse().unwrap())
        .with_identity_paths(dir.path().join("cert.pem"), dir.path().join("key.pem"));
    assert!(config.load_identity().is_err());
}
