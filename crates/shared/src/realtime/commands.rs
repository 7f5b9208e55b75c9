//! Client Commands sent to WebSocket Server

use serde::{Deserialize, Deserializer, Serialize};

/// Control frame sent from client to server
///
/// The shape is flat so that a bare `{"last_event_id": 10}` is accepted as an
/// acknowledgement:
///
/// ```json
/// {"type":"ack","last_event_id":10}
/// {"type":"subscribe","topics":["run.logs"],"run_id":"r-1"}
/// ```
///
/// Optional fields may also be sent as `null`, which reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCommand {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_id: Option<i64>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub topics: Vec<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub project_id: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub run_id: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub task_id: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// What the server should do with a [`ClientCommand`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Advance the acknowledged cursor
    Ack,
    /// Replace the subscription filter and replay from the cursor
    Subscribe,
    /// Anything else, answered with an error frame
    Unsupported(String),
}

impl ClientCommand {
    pub fn ack(last_event_id: i64) -> Self {
        Self {
            kind: "ack".to_string(),
            last_event_id: Some(last_event_id),
            ..Self::default()
        }
    }

    /// Classifies the command; the type is matched case-insensitively and an
    /// absent type means `ack`.
    pub fn action(&self) -> ClientAction {
        match self.kind.trim().to_lowercase().as_str() {
            "" | "ack" => ClientAction::Ack,
            "subscribe" => ClientAction::Subscribe,
            other => ClientAction::Unsupported(other.to_string()),
        }
    }

    /// `last_event_id` when it is a usable cursor (strictly positive).
    pub fn cursor(&self) -> Option<i64> {
        self.last_event_id.filter(|id| *id > 0)
    }
}
