//! WebSocket Handler Implementation
//!
//! Authenticates the upgrade request, checks its origin, parses the initial
//! subscription from the query string and hands the socket to the session
//! protocol.

use axum::{
    Json,
    extract::{Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use beacon_server_domain::realtime::{Principal, SubscriptionFilter};
use beacon_server_infrastructure::realtime::RealtimeBroker;

use super::auth::{PrincipalResolver, is_origin_allowed};
use super::jwt::JwtError;
use super::protocol::{SessionConfig, run_session};
use super::session::ConnectionSession;

/// Shared state of the realtime route
#[derive(Clone)]
pub struct WebSocketState {
    broker: RealtimeBroker,
    resolver: Arc<dyn PrincipalResolver>,
    config: SessionConfig,
    shutdown: CancellationToken,
}

impl WebSocketState {
    pub fn new(
        broker: RealtimeBroker,
        resolver: Arc<dyn PrincipalResolver>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            broker,
            resolver,
            config: SessionConfig::default(),
            shutdown,
        }
    }

    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn broker(&self) -> &RealtimeBroker {
        &self.broker
    }
}

/// Upgrade rejections
#[derive(Debug, Error, PartialEq)]
pub enum WsHandlerError {
    #[error("Authentication failed: {0}")]
    AuthFailed(#[from] JwtError),

    #[error("Origin not allowed")]
    OriginRejected,
}

impl WsHandlerError {
    fn status(&self) -> StatusCode {
        match self {
            Self::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            Self::OriginRejected => StatusCode::FORBIDDEN,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::AuthFailed(_) => "unauthenticated",
            Self::OriginRejected => "permission_denied",
        }
    }
}

/// JSON error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

impl IntoResponse for WsHandlerError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Query parameters accepted on the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    #[serde(default)]
    pub topics: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub last_event_id: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl ConnectQuery {
    pub fn filter(&self) -> SubscriptionFilter {
        SubscriptionFilter::from_query(&self.topics, &self.project_id, &self.run_id, &self.task_id)
    }

    /// Starting cursor; absent, unparsable and non-positive values mean 0.
    pub fn cursor(&self) -> i64 {
        self.last_event_id
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .unwrap_or(0)
    }
}

/// Checks run before the protocol switch.
pub fn authorize_upgrade(
    resolver: &dyn PrincipalResolver,
    headers: &HeaderMap,
    query: &ConnectQuery,
) -> Result<Principal, WsHandlerError> {
    let principal = resolver.resolve(headers, query.access_token.as_deref())?;
    if !is_origin_allowed(headers) {
        return Err(WsHandlerError::OriginRejected);
    }
    Ok(principal)
}

/// `GET /api/v1/realtime/ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<WebSocketState>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
) -> Response {
    let principal = match authorize_upgrade(state.resolver.as_ref(), &headers, &query) {
        Ok(principal) => principal,
        Err(e) => {
            warn!(error = %e, "Realtime upgrade rejected");
            return e.into_response();
        }
    };

    let filter = query.filter();
    let cursor = query.cursor();
    debug!(user_id = %principal.user_id, topics = ?filter.topics, cursor, "Realtime upgrade accepted");

    let read_limit = state.config.max_message_size;
    ws.max_message_size(read_limit)
        .max_frame_size(read_limit)
        .on_upgrade(move |socket| async move {
            let session_id = format!("rt-{:016x}", rand::random::<u64>());
            let session = Arc::new(ConnectionSession::new(
                session_id,
                principal,
                filter,
                cursor,
                state.broker.repository(),
            ));
            let (sink, stream) = socket.split();
            run_session(
                sink,
                stream,
                session,
                state.broker.clone(),
                state.config.clone(),
                state.shutdown.clone(),
            )
            .await;
        })
}
