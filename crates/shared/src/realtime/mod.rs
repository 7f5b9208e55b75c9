//! Realtime WebSocket Protocol
//!
//! Provides the frame types exchanged between the realtime gateway and
//! staff dashboard clients. One JSON object per WebSocket text frame.

pub mod commands;
pub mod messages;

pub use commands::{ClientAction, ClientCommand};
pub use messages::{ClientEvent, ErrorBody, ServerMessage, StreamMeta};
