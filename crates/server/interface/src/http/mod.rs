//! HTTP surface: realtime WebSocket route, metrics and health

pub mod metrics;

use axum::{Router, routing::get};
use std::sync::Arc;

use crate::health::health_router;
use crate::websocket::{WebSocketState, ws_handler};

pub use metrics::metrics_router;

/// Path of the realtime WebSocket endpoint
pub const REALTIME_WS_PATH: &str = "/api/v1/realtime/ws";

/// Full application router.
pub fn router(state: WebSocketState, registry: Arc<prometheus::Registry>) -> Router {
    let broker = state.broker().clone();
    Router::new()
        .route(REALTIME_WS_PATH, get(ws_handler))
        .with_state(state)
        .merge(metrics_router(registry))
        .merge(health_router(broker))
}
