use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the realtime event log
///
/// `id` is assigned by the database, strictly increasing, and doubles as the
/// resume cursor. Empty correlation keys mean "absent".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub id: i64,
    pub topic: String,
    pub scope: serde_json::Value,
    pub payload: serde_json::Value,
    pub correlation_id: String,
    pub project_id: String,
    pub run_id: String,
    pub task_id: String,
    pub created_at: DateTime<Utc>,
}

impl RealtimeEvent {
    /// Creates an event with empty context, payload and correlation keys.
    pub fn new(id: i64, topic: impl Into<String>) -> Self {
        Self {
            id,
            topic: topic.into(),
            scope: serde_json::Value::Object(Default::default()),
            payload: serde_json::Value::Object(Default::default()),
            correlation_id: String::new(),
            project_id: String::new(),
            run_id: String::new(),
            task_id: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = task_id.into();
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Trims text columns in place; rows may carry padding from producers.
    pub fn trimmed(mut self) -> Self {
        for field in [
            &mut self.topic,
            &mut self.correlation_id,
            &mut self.project_id,
            &mut self.run_id,
            &mut self.task_id,
        ] {
            let trimmed = field.trim();
            if trimmed.len() != field.len() {
                *field = trimmed.to_string();
            }
        }
        self
    }
}
