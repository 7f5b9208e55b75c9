// Persistence Layer - event log adapters

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryRealtimeEventRepository;
pub use postgres::*;
