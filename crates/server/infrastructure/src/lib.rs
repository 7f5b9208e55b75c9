// Beacon realtime gateway - Infrastructure Layer
// Concrete adapters grouped by technology, plus the realtime runtime

// By technology
pub mod messaging;
pub mod persistence;

// Realtime fan-out
pub mod realtime;

pub use persistence::{InMemoryRealtimeEventRepository, PostgresRealtimeEventRepository};
pub use realtime::{RealtimeBroker, RealtimeMetrics, Subscription};
