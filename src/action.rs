//! Wire types for the dispatch API.
//!
//! [`ActionRequest`] is what clients POST to `/handle`; [`Envelope`] is
//! what every transport hands back, regardless of which backend served the
//! request.
//!
//! # Example
//!
//! ```json
//! {
//!   "action": "log",
//!   "log": { "name": "event", "data": "user 42 signed in" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A client request naming an action and carrying its payload.
///
/// Exactly one payload field matters, selected by `action`; extra payload
/// fields are ignored. Routing into the closed [`Action`] enum happens in
/// the dispatcher, so an unknown `action` is a client error, never a
/// panic.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionRequest {
    /// Discriminator: "auth", "log", or "mail"
    pub action: String,

    #[serde(default)]
    pub auth: Option<AuthPayload>,

    #[serde(default)]
    pub log: Option<LogPayload>,

    #[serde(default)]
    pub mail: Option<MailPayload>,
}

/// Credentials forwarded to the authentication service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    pub email: String,
    pub password: String,
}

/// A log entry, carried unchanged through every transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPayload {
    pub name: String,
    pub data: String,
}

/// An outbound mail request forwarded to the mail service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailPayload {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub message: String,
}

/// A validated request: the closed set of things the dispatcher can do.
///
/// Adding an action means adding a variant here and handling it in the
/// dispatcher's `match`, a compile-checked extension point rather than a string
/// lookup with a silent default branch.
#[derive(Debug, Clone)]
pub enum Action {
    Auth(AuthPayload),
    Log(LogPayload),
    Mail(MailPayload),
}

impl Action {
    /// Wire name of the action, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Auth(_) => "auth",
            Action::Log(_) => "log",
            Action::Mail(_) => "mail",
        }
    }
}

/// The uniform response shape returned to the original caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub error: bool,

    pub message: String,

    /// Opaque payload relayed from the downstream service, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// Create a success envelope with a message and no data.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: message.into(),
            data: None,
        }
    }

    /// Create a failure envelope with a message and no data.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            data: None,
        }
    }

    /// Attach relayed data.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_deserialize() {
        let json_str = r#"{
            "action": "auth",
            "auth": { "email": "admin@example.com", "password": "verysecret" }
        }"#;

        let request: ActionRequest = serde_json::from_str(json_str).unwrap();
        assert_eq!(request.action, "auth");
        assert_eq!(request.auth.unwrap().email, "admin@example.com");
        assert!(request.log.is_none());
        assert!(request.mail.is_none());
    }

    #[test]
    fn test_request_ignores_irrelevant_payloads() {
        let json_str = r#"{
            "action": "log",
            "log": { "name": "event", "data": "something happened" },
            "mail": { "from": "a@b.c", "to": "d@e.f", "subject": "s", "message": "m" }
        }"#;

        let request: ActionRequest = serde_json::from_str(json_str).unwrap();
        assert_eq!(request.action, "log");
        assert_eq!(request.log.unwrap().name, "event");
        // The mail payload decodes but is irrelevant to a "log" action.
        assert!(request.mail.is_some());
    }

    #[test]
    fn test_envelope_omits_absent_data() {
        let envelope = Envelope::ok("Hit the broker");
        let json_str = serde_json::to_string(&envelope).unwrap();
        assert!(json_str.contains("\"error\":false"));
        assert!(!json_str.contains("data"));
    }

    #[test]
    fn test_envelope_with_data() {
        let envelope = Envelope::ok("Authenticated").with_data(json!({"id": 1}));
        let json_str = serde_json::to_string(&envelope).unwrap();
        assert!(json_str.contains("\"data\":{\"id\":1}"));

        let back: Envelope = serde_json::from_str(&json_str).unwrap();
        assert_eq!(back.data, Some(json!({"id": 1})));
    }

    #[test]
    fn test_envelope_deserialize_without_data() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"error":true,"message":"unauthorized"}"#).unwrap();
        assert!(envelope.error);
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_action_name() {
        let action = Action::Log(LogPayload {
            name: "event".into(),
            data: "x".into(),
        });
        assert_eq!(action.name(), "log");
    }
}
