//! WebSocket Realtime Endpoint
//!
//! ## Flow
//!
//! ```text
//!  GET /api/v1/realtime/ws?topics=run.logs&project_id=p1&last_event_id=42
//!        │
//!        ▼
//!  1. Resolve principal (Bearer header or access_token)   401 on failure
//!  2. Check Origin against Host / X-Forwarded-Host        403 on failure
//!  3. Upgrade, subscribe to the broker, send hello
//!  4. Replay the log after last_event_id in pages of 400
//!  5. Stream live events; handle ack / subscribe frames
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let state = WebSocketState::new(broker, resolver, shutdown);
//! let router = Router::new()
//!     .route("/api/v1/realtime/ws", get(ws_handler))
//!     .with_state(state);
//! ```

mod auth;
mod handler;
mod jwt;
mod protocol;
mod session;

pub use auth::{JwtPrincipalResolver, PrincipalResolver, is_origin_allowed};
pub use handler::{ConnectQuery, WebSocketState, WsHandlerError, authorize_upgrade, ws_handler};
pub use jwt::{
    JwtClaims, JwtConfig, JwtError, ROLE_PLATFORM_ADMIN, ROLE_PLATFORM_OWNER,
    extract_token_from_header,
};
pub use protocol::{
    MAX_MESSAGE_SIZE, PING_INTERVAL, READ_IDLE_TIMEOUT, REPLAY_PAGE_SIZE, SessionConfig,
    WRITE_TIMEOUT, run_session,
};
pub use session::{ConnectionSession, SessionError, SessionState};

// Re-export types from shared crate
pub use beacon_shared::realtime::{ClientCommand, ServerMessage};
