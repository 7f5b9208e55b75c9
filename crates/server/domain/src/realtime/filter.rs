use serde::{Deserialize, Serialize};

use beacon_shared::DEFAULT_TOPICS;

use super::event::RealtimeEvent;

/// Topic and scope selection for one connection
///
/// Empty scope fields are wildcards. An empty topic list means the default
/// topic set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionFilter {
    pub topics: Vec<String>,
    pub project_id: String,
    pub run_id: String,
    pub task_id: String,
}

impl SubscriptionFilter {
    pub fn new<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
            ..Default::default()
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

    /// Builds a filter from a comma separated topic list, as sent in the
    /// upgrade query string.
    pub fn from_query(topics: &str, project_id: &str, run_id: &str, task_id: &str) -> Self {
        Self {
            topics: topics.split(',').map(str::to_string).collect(),
            project_id: project_id.to_string(),
            run_id: run_id.to_string(),
            task_id: task_id.to_string(),
        }
        .normalize()
    }

    /// Trims every field, drops blank and repeated topics and falls back to
    /// the default topic set when nothing remains.
    pub fn normalize(self) -> Self {
        let mut topics: Vec<String> = Vec::with_capacity(self.topics.len());
        for topic in &self.topics {
            let topic = topic.trim();
            if topic.is_empty() || topics.iter().any(|seen| seen == topic) {
                continue;
            }
            topics.push(topic.to_string());
        }
        if topics.is_empty() {
            topics = DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect();
        }

        Self {
            topics,
            project_id: self.project_id.trim().to_string(),
            run_id: self.run_id.trim().to_string(),
            task_id: self.task_id.trim().to_string(),
        }
    }

    pub fn has_topic(&self, topic: &str) -> bool {
        if self.topics.is_empty() {
            return DEFAULT_TOPICS.contains(&topic);
        }
        self.topics.iter().any(|t| t == topic)
    }

    pub fn matches(&self, event: &RealtimeEvent) -> bool {
        if !self.has_topic(&event.topic) {
            return false;
        }
        scope_matches(&self.project_id, &event.project_id)
            && scope_matches(&self.run_id, &event.run_id)
            && scope_matches(&self.task_id, &event.task_id)
    }
}

fn scope_matches(wanted: &str, actual: &str) -> bool {
    wanted.is_empty() || wanted == actual
}
