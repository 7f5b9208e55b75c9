//! Realtime bounded context
//!
//! Events read from the durable realtime log, the per-connection filter that
//! selects them, the principal they are authorized against and the port the
//! infrastructure implements to reach the log.

pub mod event;
pub mod filter;
pub mod principal;
pub mod repository;

pub use event::RealtimeEvent;
pub use filter::SubscriptionFilter;
pub use principal::Principal;
pub use repository::{
    DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT, RealtimeEventRepository, normalize_list_window,
};
