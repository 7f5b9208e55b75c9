//! Messaging infrastructure: PostgreSQL LISTEN/NOTIFY and reconnect backoff.

pub mod backoff;
pub mod pg_notify_listener;

pub use backoff::{Backoff, BackoffConfig};
pub use pg_notify_listener::{
    NotificationConnector, NotificationStream, PgNotifyConnector, PgNotifyListener,
};
