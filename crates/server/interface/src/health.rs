//! Liveness endpoint
//!
//! Reports process liveness plus a summary of the realtime broker.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use beacon_server_infrastructure::realtime::RealtimeBroker;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: &'static str,
    pub realtime: RealtimeHealth,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RealtimeHealth {
    pub running: bool,
    pub subscribers: usize,
}

pub fn health_router(broker: RealtimeBroker) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .with_state(broker)
}

async fn health_handler(State(broker): State<RealtimeBroker>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        realtime: RealtimeHealth {
            running: broker.is_running(),
            subscribers: broker.subscriber_count(),
        },
    })
}
