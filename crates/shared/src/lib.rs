//! Beacon shared kernel
//!
//! Types shared between the realtime gateway server crates and its clients:
//! topic names, the WebSocket wire protocol and configuration DTOs.

pub mod config;
pub mod event_topics;
pub mod realtime;

pub use event_topics::*;
