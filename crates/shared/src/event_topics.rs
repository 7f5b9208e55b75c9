//! Centralized realtime topic constants
//!
//! Single source of truth for the topic names producers write into the
//! realtime event log and dashboard clients subscribe to.
//!
//! ## Naming Convention
//! - Format: `{entity}.{stream}`
//! - entity: `run`, `deploy`, `system`
//! - stream: `events`, `status`, `logs`, `errors`
//!
//! Producers may write custom topics; those are only delivered to clients
//! that ask for them explicitly.
//!
//! ## Usage
//! ```rust
//! use beacon_shared::event_topics::{DEFAULT_TOPICS, run_topics};
//!
//! assert!(DEFAULT_TOPICS.contains(&run_topics::EVENTS));
//! ```

/// Default LISTEN/NOTIFY channel carrying new realtime event ids
pub const DEFAULT_NOTIFY_CHANNEL: &str = "beacon_realtime";

/// Run-related topics
pub mod run_topics {
    /// Run lifecycle transitions
    pub const EVENTS: &str = "run.events";
    /// Run status snapshots
    pub const STATUS: &str = "run.status";
    /// Job log lines emitted by a run
    pub const LOGS: &str = "run.logs";
}

/// Deploy-related topics
pub mod deploy_topics {
    /// Deploy progress events
    pub const EVENTS: &str = "deploy.events";
    /// Deploy log lines
    pub const LOGS: &str = "deploy.logs";
}

/// Platform-wide topics
pub mod system_topics {
    /// Platform errors surfaced to staff
    pub const ERRORS: &str = "system.errors";
}

/// Topics a subscription receives when the client names none
pub const DEFAULT_TOPICS: [&str; 6] = [
    run_topics::EVENTS,
    run_topics::STATUS,
    run_topics::LOGS,
    deploy_topics::EVENTS,
    deploy_topics::LOGS,
    system_topics::ERRORS,
];

/// Returns true when `topic` belongs to the default set.
pub fn is_default_topic(topic: &str) -> bool {
    DEFAULT_TOPICS.contains(&topic)
}
