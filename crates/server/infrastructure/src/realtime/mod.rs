//! Realtime Infrastructure
//!
//! Broker fan-out, the LISTEN/NOTIFY listener feeding it and the retention
//! worker trimming the event log.

pub mod broker;
pub mod cleanup;
pub mod listener;
pub mod metrics;

// Re-exports
pub use broker::{
    BrokerConfig, DEFAULT_SUBSCRIBER_BUFFER, RealtimeBroker, SESSION_SUBSCRIBER_BUFFER,
    Subscription,
};
pub use cleanup::RetentionWorker;
pub use listener::{ListenerError, NotificationListener, parse_event_id};
pub use metrics::{RealtimeMetrics, RealtimeMetricsSnapshot};
