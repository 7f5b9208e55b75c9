//! Server-to-client frames for the realtime WebSocket protocol

use serde::{Deserialize, Serialize};

/// Error code sent when a client frame cannot be handled
pub const ERROR_CODE_INVALID_ARGUMENT: &str = "invalid_argument";

/// `meta.status` of the greeting frame
pub const STATUS_CONNECTED: &str = "connected";

/// `meta.status` of a completed re-subscription
pub const STATUS_OK: &str = "ok";

/// Server message envelope sent to WebSocket clients
///
/// The discriminator is carried in `type`; the remaining members depend on
/// the variant:
///
/// ```json
/// {"type":"hello","meta":{"status":"connected","last_event_id":42}}
/// {"type":"event","event":{"id":43,"topic":"run.events",...}}
/// {"type":"error","error":{"code":"invalid_argument","message":"..."}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Greeting sent right after the upgrade, carrying the effective cursor
    Hello { meta: StreamMeta },

    /// Confirmation that a `subscribe` frame was applied and replayed
    Subscribed { meta: StreamMeta },

    /// One event from the realtime log
    Event { event: ClientEvent },

    /// Typed error; the connection stays open
    Error { error: ErrorBody },
}

impl ServerMessage {
    pub fn hello(last_event_id: i64) -> Self {
        Self::Hello {
            meta: StreamMeta::new(STATUS_CONNECTED, last_event_id),
        }
    }

    pub fn subscribed(last_event_id: i64) -> Self {
        Self::Subscribed {
            meta: StreamMeta::new(STATUS_OK, last_event_id),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorBody {
                code: ERROR_CODE_INVALID_ARGUMENT.to_string(),
                message: message.into(),
            },
        }
    }

    /// Event id carried by this frame, if it is an event frame.
    pub fn event_id(&self) -> Option<i64> {
        match self {
            Self::Event { event } => Some(event.id),
            _ => None,
        }
    }
}

/// Stream position metadata attached to `hello` and `subscribed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMeta {
    pub status: String,
    pub last_event_id: i64,
}

impl StreamMeta {
    pub fn new(status: impl Into<String>, last_event_id: i64) -> Self {
        Self {
            status: status.into(),
            last_event_id,
        }
    }
}

/// Error body of an `error` frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Event projected for dashboard clients
///
/// Empty correlation keys are sent as empty strings so clients can rely on
/// the members being present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEvent {
    /// Realtime log id, doubles as the resume cursor
    pub id: i64,
    pub topic: String,
    /// Opaque event context
    pub scope: serde_json::Value,
    /// Opaque event body
    pub payload: serde_json::Value,
    pub correlation_id: String,
    pub project_id: String,
    pub run_id: String,
    pub task_id: String,
    /// RFC 3339 timestamp in UTC with nanoseconds
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hello_wire_format() {
        let json = serde_json::to_value(ServerMessage::hello(42)).unwrap();
        assert_eq!(
            json,
            json!({"type": "hello", "meta": {"status": "connected", "last_event_id": 42}})
        );
    }

    #[test]
    fn test_error_wire_format() {
        let json = serde_json::to_value(ServerMessage::invalid_argument("unsupported message type"))
            .unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["error"]["code"], "invalid_argument");
        assert_eq!(json["error"]["message"], "unsupported message type");
        assert!(json.get("meta").is_none());
    }

    #[test]
    fn test_event_wire_format() {
        let message = ServerMessage::Event {
            event: ClientEvent {
                id: 7,
                topic: "run.events".to_string(),
                scope: json!({"stage": "build"}),
                payload: json!({"status": "running"}),
                correlation_id: String::new(),
                project_id: "p1".to_string(),
                run_id: "r1".to_string(),
                task_id: String::new(),
                created_at: "2026-01-02T03:04:05.000000006Z".to_string(),
            },
        };
        assert_eq!(message.event_id(), Some(7));

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["event"]["id"], 7);
        assert_eq!(json["event"]["scope"]["stage"], "build");
        assert_eq!(json["event"]["correlation_id"], "");
        assert_eq!(json["event"]["created_at"], "2026-01-02T03:04:05.000000006Z");
    }

    #[test]
    fn test_subscribed_has_no_event_id() {
        assert_eq!(ServerMessage::subscribed(3).event_id(), None);
    }
}
