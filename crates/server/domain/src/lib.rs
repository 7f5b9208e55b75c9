// Beacon realtime gateway - Domain Layer
// Bounded contexts:
// - shared_kernel: shared error type
// - realtime: realtime events, subscription filters, principals and the event log port

pub mod realtime;
pub mod shared_kernel;

pub use realtime::*;
pub use shared_kernel::*;
