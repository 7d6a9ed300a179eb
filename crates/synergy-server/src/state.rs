//! Connection state machine.
//!
//! ```text
//! Connecting --Connected--> HandshakeInProgress --HandshakeCompleted--> Secure --Closed--> Closed
//!      |                           |                                        |
//!      +------- TransportError / HandshakeFailed / Closed -----------------+--> Faulted
//! ```
//!
//! `Closed` and `Faulted` are terminal. A failed handshake never reaches
//! `Secure`.

use std::fmt;
use std::io;

use rustls::CertificateError;
use tracing::debug;

use crate::error::{ServerError, ServerResult};

/// Which end of the connection this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Dials out and verifies the server's certificate.
    Client,
    /// Accepts and presents its certificate.
    Server,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => f.write_str("client"),
            Self::Server => f.write_str("server"),
        }
    }
}

/// Lifecycle state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport not yet established.
    Connecting,
    /// Transport up, TLS handshake running.
    HandshakeInProgress,
    /// Handshake done; application data may flow.
    Secure,
    /// Orderly end after a secure session.
    Closed,
    /// Ended by an error or an abandoned handshake.
    Faulted,
}

impl ConnectionState {
    /// Returns true for states that accept no further events.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Faulted)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::HandshakeInProgress => "handshake-in-progress",
            Self::Secure => "secure",
            Self::Closed => "closed",
            Self::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

/// Why a TLS handshake failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeFailure {
    /// The peer's certificate was not issued by a trusted certificate.
    UnknownIssuer,
    /// The certificate does not cover the name we dialed.
    NameMismatch,
    /// The certificate is outside its validity period.
    Expired,
    /// Any other certificate problem.
    BadCertificate(String),
    /// The peer aborted the handshake with an alert.
    Alert(String),
    /// TLS protocol or transport error during the handshake.
    Protocol(String),
    /// The handshake did not finish within the configured timeout.
    Timeout,
}

impl HandshakeFailure {
    /// Classifies an IO error returned by a TLS accept or connect.
    pub fn from_io(error: &io::Error) -> Self {
        if error.kind() == io::ErrorKind::TimedOut {
            return Self::Timeout;
        }
        match error
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<rustls::Error>())
        {
            Some(tls) => Self::from_tls(tls),
            None => Self::Protocol(error.to_string()),
        }
    }

    /// Classifies a rustls error.
    pub fn from_tls(error: &rustls::Error) -> Self {
        match error {
            rustls::Error::InvalidCertificate(cert) => match cert {
                CertificateError::UnknownIssuer => Self::UnknownIssuer,
                CertificateError::NotValidForName
                | CertificateError::NotValidForNameContext { .. } => Self::NameMismatch,
                CertificateError::Expired | CertificateError::ExpiredContext { .. } => {
                    Self::Expired
                }
                other => Self::BadCertificate(format!("{other:?}")),
            },
            rustls::Error::AlertReceived(alert) => Self::Alert(format!("{alert:?}")),
            other => Self::Protocol(other.to_string()),
        }
    }
}

impl fmt::Display for HandshakeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownIssuer => f.write_str("certificate issuer is not trusted"),
            Self::NameMismatch => f.write_str("certificate does not match server name"),
            Self::Expired => f.write_str("certificate expired"),
            Self::BadCertificate(reason) => write!(f, "bad certificate: {reason}"),
            Self::Alert(alert) => write!(f, "peer sent alert {alert}"),
            Self::Protocol(reason) => write!(f, "{reason}"),
            Self::Timeout => f.write_str("timed out"),
        }
    }
}

/// Something that happened to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The stream connection is up.
    Connected,
    /// TLS handshake finished and the peer is trusted.
    HandshakeCompleted,
    /// TLS handshake failed.
    HandshakeFailed(HandshakeFailure),
    /// The stream reported an error.
    TransportError(String),
    /// The stream was closed by either side.
    Closed,
}

impl fmt::Display for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::HandshakeCompleted => f.write_str("handshake-completed"),
            Self::HandshakeFailed(failure) => write!(f, "handshake-failed ({failure})"),
            Self::TransportError(reason) => write!(f, "transport-error ({reason})"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Drives one connection's state. Events are applied in arrival order.
#[derive(Debug, Clone)]
pub struct StateMachine {
    role: Role,
    state: ConnectionState,
}

impl StateMachine {
    /// Creates a machine in `Connecting`.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            state: ConnectionState::Connecting,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Role of this end.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Checks if an event is accepted in the current state.
    #[must_use]
    pub fn can_apply(&self, event: &TransportEvent) -> bool {
        next_state(self.state, event).is_some()
    }

    /// Applies an event, returning the new state.
    ///
    /// Rejected events leave the state unchanged.
    pub fn apply(&mut self, event: TransportEvent) -> ServerResult<ConnectionState> {
        let Some(next) = next_state(self.state, &event) else {
            return Err(ServerError::InvalidTransition {
                from: self.state,
                event,
            });
        };

        debug!(
            role = %self.role,
            from = %self.state,
            to = %next,
            event = %event,
            "Connection state transition"
        );
        self.state = next;
        Ok(next)
    }
}

fn next_state(state: ConnectionState, event: &TransportEvent) -> Option<ConnectionState> {
    use ConnectionState::*;

    match (state, event) {
        (Closed | Faulted, _) => None,

        (Connecting, TransportEvent::Connected) => Some(HandshakeInProgress),
        (HandshakeInProgress, TransportEvent::HandshakeCompleted) => Some(Secure),
        (HandshakeInProgress, TransportEvent::HandshakeFailed(_)) => Some(Faulted),
        (Secure, TransportEvent::Closed) => Some(Closed),
        (Connecting | HandshakeInProgress, TransportEvent::Closed) => Some(Faulted),
        (_, TransportEvent::TransportError(_)) => Some(Faulted),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secure() -> StateMachine {
        let mut machine = StateMachine::new(Role::Client);
        machine.apply(TransportEvent::Connected).unwrap();
        machine.apply(TransportEvent::HandshakeCompleted).unwrap();
        machine
    }

    #[test]
    fn happy_path() {
        let mut machine = StateMachine::new(Role::Server);
        assert_eq!(machine.state(), ConnectionState::Connecting);
        assert_eq!(
            machine.apply(TransportEvent::Connected).unwrap(),
            ConnectionState::HandshakeInProgress
        );
        assert_eq!(
            machine.apply(TransportEvent::HandshakeCompleted).unwrap(),
            ConnectionState::Secure
        );
        assert_eq!(
            machine.apply(TransportEvent::Closed).unwrap(),
            ConnectionState::Closed
        );
        assert!(machine.state().is_terminal());
    }

    #[test]
    fn failed_handshake_never_becomes_secure() {
        let mut machine = StateMachine::new(Role::Client);
        machine.apply(TransportEvent::Connected).unwrap();
        machine
            .apply(TransportEvent::HandshakeFailed(HandshakeFailure::UnknownIssuer))
            .unwrap();
        assert_eq!(machine.state(), ConnectionState::Faulted);

        let err = machine.apply(TransportEvent::HandshakeCompleted).unwrap_err();
        assert!(matches!(
            err,
            ServerError::InvalidTransition {
                from: ConnectionState::Faulted,
                ..
            }
        ));
        assert_eq!(machine.state(), ConnectionState::Faulted);
    }

    #[test]
    fn handshake_cannot_complete_before_connect() {
        let machine = StateMachine::new(Role::Client);
        assert!(!machine.can_apply(&TransportEvent::HandshakeCompleted));
        assert!(!machine.can_apply(&TransportEvent::HandshakeFailed(HandshakeFailure::Timeout)));
    }

    #[test]
    fn abandoned_handshake_is_a_fault() {
        let mut machine = StateMachine::new(Role::Server);
        machine.apply(TransportEvent::Connected).unwrap();
        assert_eq!(
            machine.apply(TransportEvent::Closed).unwrap(),
            ConnectionState::Faulted
        );
    }

    #[test]
    fn transport_error_faults_any_live_state() {
        for mut machine in [StateMachine::new(Role::Client), secure()] {
            machine
                .apply(TransportEvent::TransportError("reset".into()))
                .unwrap();
            assert_eq!(machine.state(), ConnectionState::Faulted);
        }
    }

    #[test]
    fn terminal_states_accept_nothing() {
        let mut machine = secure();
        machine.apply(TransportEvent::Closed).unwrap();
        for event in [
            TransportEvent::Connected,
            TransportEvent::HandshakeCompleted,
            TransportEvent::Closed,
            TransportEvent::TransportError("late".into()),
        ] {
            assert!(!machine.can_apply(&event));
        }
    }

    #[test]
    fn secure_rejects_second_handshake() {
        let mut machine = secure();
        assert!(machine.apply(TransportEvent::Connected).is_err());
        assert!(machine.apply(TransportEvent::HandshakeCompleted).is_err());
        assert_eq!(machine.state(), ConnectionState::Secure);
    }

    #[test]
    fn classify_certificate_errors() {
        let unknown = rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer);
        assert_eq!(HandshakeFailure::from_tls(&unknown), HandshakeFailure::UnknownIssuer);

        let name = rustls::Error::InvalidCertificate(CertificateError::NotValidForName);
        assert_eq!(HandshakeFailure::from_tls(&name), HandshakeFailure::NameMismatch);

        let wrapped = io::Error::new(io::ErrorKind::InvalidData, unknown);
        assert_eq!(HandshakeFailure::from_io(&wrapped), HandshakeFailure::UnknownIssuer);
    }

    #[test]
    fn classify_webpki_context_errors() {
        use rustls::pki_types::{ServerName, UnixTime};
        use std::time::Duration;

        let name = rustls::Error::InvalidCertificate(CertificateError::NotValidForNameContext {
            expected: ServerName::try_from("example.org").unwrap(),
            presented: vec!["DnsName(\"localhost\")".to_string()],
        });
        assert_eq!(HandshakeFailure::from_tls(&name), HandshakeFailure::NameMismatch);

        let expired = rustls::Error::InvalidCertificate(CertificateError::ExpiredContext {
            time: UnixTime::since_unix_epoch(Duration::from_secs(2_000_000_000)),
            not_after: UnixTime::since_unix_epoch(Duration::from_secs(1_000_000_000)),
        });
        assert_eq!(HandshakeFailure::from_tls(&expired), HandshakeFailure::Expired);

        let wrapped = io::Error::new(io::ErrorKind::InvalidData, expired);
        assert_eq!(HandshakeFailure::from_io(&wrapped), HandshakeFailure::Expired);

        let other = rustls::Error::InvalidCertificate(CertificateError::BadSignature);
        assert!(matches!(
            HandshakeFailure::from_tls(&other),
            HandshakeFailure::BadCertificate(_)
        ));
    }

    #[test]
    fn classify_other_io_errors() {
        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        assert!(matches!(
            HandshakeFailure::from_io(&reset),
            HandshakeFailure::Protocol(_)
        ));
        let timeout = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(HandshakeFailure::from_io(&timeout), HandshakeFailure::Timeout);
    }
}
