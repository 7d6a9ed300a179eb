//! Session-join request and its acknowledgement.
//!
//! Session management itself lives elsewhere; these messages only carry a
//! client's intent ("join this session" or "create a new one") and the
//! server's answer.

use serde_json::Value;

use crate::envelope::{MessageType, Payload};
use crate::error::ValidationError;
use crate::message::{Message, optional_bool, optional_str, required_str};

/// `JOIN_SESSION_REQUEST`: join an existing session or create a new one.
///
/// Exactly one intent is valid: a target session id, or `create_new`.
/// Both at once is rejected in either direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionJoinRequest {
    target_session_id: Option<String>,
    create_new: bool,
    username: String,
}

impl SessionJoinRequest {
    /// Request to join an existing session.
    pub fn join(session_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            target_session_id: Some(session_id.into()),
            create_new: false,
            username: username.into(),
        }
    }

    /// Request to create a new session.
    pub fn create(username: impl Into<String>) -> Self {
        Self {
            target_session_id: None,
            create_new: true,
            username: username.into(),
        }
    }

    /// Builds a request from raw parts without checking them.
    ///
    /// Validation happens when the request is serialized.
    pub fn from_parts(
        target_session_id: Option<String>,
        create_new: bool,
        username: impl Into<String>,
    ) -> Self {
        Self {
            target_session_id,
            create_new,
            username: username.into(),
        }
    }

    /// Session the client wants to join, if any.
    pub fn target_session_id(&self) -> Option<&str> {
        self.target_session_id.as_deref()
    }

    /// Whether the client asks for a new session.
    pub fn create_new(&self) -> bool {
        self.create_new
    }

    /// Name the client presents.
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl Message for SessionJoinRequest {
    fn message_type(&self) -> MessageType {
        MessageType::JoinSessionRequest
    }

    fn to_payload(&self) -> Result<Payload, ValidationError> {
        if self.username.is_empty() {
            return Err(ValidationError::Empty("username"));
        }

        let mut payload = Payload::new();
        match (self.target_session_id.as_deref(), self.create_new) {
            (Some(_), true) => return Err(ValidationError::AmbiguousIntent),
            (Some(""), false) => return Err(ValidationError::Empty("session_id")),
            (Some(id), false) => {
                payload.insert("session_id".into(), Value::String(id.to_string()));
            }
            (None, true) => {
                payload.insert("create_new".into(), Value::Bool(true));
            }
            (None, false) => return Err(ValidationError::MissingIntent),
        }
        payload.insert("username".into(), Value::String(self.username.clone()));
        Ok(payload)
    }

    fn load_payload(&mut self, payload: &Payload) -> Result<(), ValidationError> {
        let username = required_str(payload, "username")?;
        let session_id = optional_str(payload, "session_id")?;
        let create_new = optional_bool(payload, "create_new")?;

        let (target_session_id, create_new) = match (session_id, create_new) {
            (Some(_), Some(true)) => return Err(ValidationError::AmbiguousIntent),
            (Some(""), _) => return Err(ValidationError::Empty("session_id")),
            (Some(id), _) => (Some(id.to_string()), false),
            (None, Some(true)) => (None, true),
            (None, Some(false)) | (None, None) => return Err(ValidationError::MissingIntent),
        };

        self.target_session_id = target_session_id;
        self.create_new = create_new;
        self.username = username.to_string();
        Ok(())
    }
}

/// `JOIN_SESSION_ACK`: the server accepted a join request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionJoinAck {
    username: String,
    session_id: Option<String>,
}

impl SessionJoinAck {
    /// Acknowledgement echoing the requester's name and target session.
    pub fn for_request(request: &SessionJoinRequest) -> Self {
        Self {
            username: request.username().to_string(),
            session_id: request.target_session_id().map(str::to_string),
        }
    }

    /// Name of the acknowledged requester.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Session the requester asked to join, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

impl Message for SessionJoinAck {
    fn message_type(&self) -> MessageType {
        MessageType::JoinSessionAck
    }

    fn to_payload(&self) -> Result<Payload, ValidationError> {
        if self.username.is_empty() {
            return Err(ValidationError::Empty("username"));
        }

        let mut payload = Payload::new();
        if let Some(id) = &self.session_id {
            payload.insert("session_id".into(), Value::String(id.clone()));
        }
        payload.insert("username".into(), Value::String(self.username.clone()));
        Ok(payload)
    }

    fn load_payload(&mut self, payload: &Payload) -> Result<(), ValidationError> {
        let username = required_str(payload, "username")?;
        let session_id = optional_str(payload, "session_id")?;

        self.username = username.to_string();
        self.session_id = session_id.map(str::to_string);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => panic!("test payload must be an object"),
        }
    }

    fn load(value: Value) -> Result<SessionJoinRequest, ValidationError> {
        let mut request = SessionJoinRequest::default();
        request.load_payload(&payload(value))?;
        Ok(request)
    }

    #[test]
    fn create_payload() {
        let p = SessionJoinRequest::create("Client").to_payload().unwrap();
        assert_eq!(Value::Object(p), json!({"create_new": true, "username": "Client"}));
    }

    #[test]
    fn join_payload() {
        let p = SessionJoinRequest::join("abc", "Client").to_payload().unwrap();
        assert_eq!(Value::Object(p), json!({"session_id": "abc", "username": "Client"}));
    }

    #[test]
    fn empty_username_never_serializes() {
        for request in [
            SessionJoinRequest::create(""),
            SessionJoinRequest::join("abc", ""),
            SessionJoinRequest::from_parts(None, false, ""),
        ] {
            assert_eq!(request.to_payload(), Err(ValidationError::Empty("username")));
        }
    }

    #[test]
    fn both_intents_rejected_at_serialize() {
        let request = SessionJoinRequest::from_parts(Some("abc".into()), true, "Client");
        assert_eq!(request.to_payload(), Err(ValidationError::AmbiguousIntent));
    }

    #[test]
    fn neither_intent_rejected_at_serialize() {
        let request = SessionJoinRequest::from_parts(None, false, "Client");
        assert_eq!(request.to_payload(), Err(ValidationError::MissingIntent));
    }

    #[test]
    fn empty_session_id_rejected_at_serialize() {
        let request = SessionJoinRequest::join("", "Client");
        assert_eq!(request.to_payload(), Err(ValidationError::Empty("session_id")));
    }

    #[test]
    fn load_create_request() {
        let request = load(json!({"create_new": true, "username": "Client"})).unwrap();
        assert!(request.create_new());
        assert_eq!(request.target_session_id(), None);
        assert_eq!(request.username(), "Client");
    }

    #[test]
    fn load_join_request() {
        let request = load(json!({"session_id": "abc", "username": "Client"})).unwrap();
        assert!(!request.create_new());
        assert_eq!(request.target_session_id(), Some("abc"));
    }

    #[test]
    fn load_rejects_missing_or_empty_username() {
        assert_eq!(
            load(json!({"create_new": true})),
            Err(ValidationError::MissingField("username"))
        );
        assert_eq!(
            load(json!({"session_id": "abc", "username": ""})),
            Err(ValidationError::Empty("username"))
        );
        assert!(load(json!({"create_new": true, "username": 3})).is_err());
    }

    #[test]
    fn load_rejects_neither_intent() {
        assert_eq!(load(json!({"username": "a"})), Err(ValidationError::MissingIntent));
        assert_eq!(
            load(json!({"username": "a", "create_new": false})),
            Err(ValidationError::MissingIntent)
        );
    }

    #[test]
    fn load_rejects_non_boolean_create_new() {
        assert!(matches!(
            load(json!({"username": "a", "create_new": "yes"})),
            Err(ValidationError::WrongKind { field: "create_new", .. })
        ));
    }

    #[test]
    fn load_rejects_non_string_session_id() {
        assert!(matches!(
            load(json!({"username": "a", "session_id": 12})),
            Err(ValidationError::WrongKind { field: "session_id", .. })
        ));
        assert!(matches!(
            load(json!({"username": "a", "session_id": null, "create_new": true})),
            Err(ValidationError::WrongKind { field: "session_id", .. })
        ));
    }

    #[test]
    fn load_rejects_both_intents() {
        assert_eq!(
            load(json!({"username": "a", "session_id": "abc", "create_new": true})),
            Err(ValidationError::AmbiguousIntent)
        );
    }

    #[test]
    fn failed_load_leaves_request_untouched() {
        let mut request = SessionJoinRequest::create("Client");
        let before = request.clone();
        assert!(request.load_payload(&payload(json!({"username": "x"}))).is_err());
        assert_eq!(request, before);
    }

    #[test]
    fn ack_echoes_request() {
        let ack = SessionJoinAck::for_request(&SessionJoinRequest::join("abc", "Client"));
        assert_eq!(ack.username(), "Client");
        assert_eq!(ack.session_id(), Some("abc"));

        let p = ack.to_payload().unwrap();
        let mut loaded = SessionJoinAck::default();
        loaded.load_payload(&p).unwrap();
        assert_eq!(loaded, ack);
    }

    #[test]
    fn ack_requires_username() {
        assert_eq!(
            SessionJoinAck::default().to_payload(),
            Err(ValidationError::Empty("username"))
        );
        let mut ack = SessionJoinAck::default();
        assert!(ack.load_payload(&payload(json!({"session_id": "abc"}))).is_err());
    }
}
