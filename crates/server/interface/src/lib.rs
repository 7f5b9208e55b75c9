pub mod health;
pub mod http;
pub mod mappers;
pub mod websocket;

pub use http::router;
