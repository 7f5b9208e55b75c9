//! HTTP handlers for Prometheus metrics exposition

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;

/// Metrics state for the HTTP server
#[derive(Clone)]
pub struct MetricsState {
    pub registry: Arc<prometheus::Registry>,
}

/// Create the metrics router
pub fn metrics_router(registry: Arc<prometheus::Registry>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(MetricsState { registry })
}

/// Handler for Prometheus metrics exposition
async fn metrics_handler(
    State(state): State<MetricsState>,
) -> Result<Response, (StatusCode, String)> {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let response = String::from_utf8(buffer)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        response,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use beacon_server_infrastructure::realtime::RealtimeMetrics;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let registry = Arc::new(prometheus::Registry::new());
        let metrics = RealtimeMetrics::new().unwrap();
        metrics.register(&registry).unwrap();
        metrics.session_opened();

        let response = metrics_router(registry)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4; charset=utf-8"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("# HELP"));
        assert!(text.contains("realtime_sessions_total 1"));
    }
}
