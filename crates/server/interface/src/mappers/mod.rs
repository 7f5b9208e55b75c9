//! Domain-Wire Mappers
//!
//! Conversion from realtime log rows to the JSON frames sent to clients.

use chrono::SecondsFormat;

use beacon_server_domain::realtime::RealtimeEvent;
use beacon_shared::realtime::{ClientEvent, ServerMessage};

/// Project an event row onto its wire representation.
///
/// `created_at` is rendered as RFC 3339 in UTC with nanosecond precision.
pub fn to_client_event(event: &RealtimeEvent) -> ClientEvent {
    ClientEvent {
        id: event.id,
        topic: event.topic.clone(),
        scope: event.scope.clone(),
        payload: event.payload.clone(),
        correlation_id: event.correlation_id.clone(),
        project_id: event.project_id.clone(),
        run_id: event.run_id.clone(),
        task_id: event.task_id.clone(),
        created_at: event.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
    }
}

#[inline]
pub fn event_message(event: &RealtimeEvent) -> ServerMessage {
    ServerMessage::Event {
        event: to_client_event(event),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_client_event_projection() {
        let created_at = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap()
            + chrono::Duration::nanoseconds(8);
        let event = RealtimeEvent::new(9, "deploy.logs")
            .with_project("p1")
            .with_payload(json!({"line": "ok"}))
            .with_created_at(created_at);

        let client = to_client_event(&event);
        assert_eq!(client.id, 9);
        assert_eq!(client.topic, "deploy.logs");
        assert_eq!(client.project_id, "p1");
        assert_eq!(client.payload, json!({"line": "ok"}));
        assert_eq!(client.created_at, "2026-03-04T05:06:07.000000008Z");
    }

    #[test]
    fn test_event_message_shape() {
        let value = serde_json::to_value(event_message(&RealtimeEvent::new(3, "run.status"))).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["event"]["id"], 3);
        assert_eq!(value["event"]["scope"], json!({}));
    }
}
