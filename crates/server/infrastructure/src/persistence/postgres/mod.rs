pub mod pool;
pub mod realtime_event_repository;

pub use pool::*;
pub use realtime_event_repository::*;
