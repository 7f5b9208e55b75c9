//! Per-connection session state
//!
//! Holds what one WebSocket connection knows about its client: who it is,
//! which events it wants, how far it has read and which projects it may see.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use beacon_server_domain::realtime::{
    Principal, RealtimeEvent, RealtimeEventRepository, SubscriptionFilter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Replaying,
    Streaming,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Replaying => "replaying",
            Self::Streaming => "streaming",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("write deadline exceeded")]
    WriteTimeout,

    #[error("read idle deadline exceeded")]
    ReadTimeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("replay failed: {0}")]
    Replay(String),

    #[error("encode server message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("broker subscription closed")]
    SubscriptionClosed,

    #[error("inbound message of {0} bytes exceeds the read limit")]
    MessageTooLarge(usize),
}

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    filter: SubscriptionFilter,
    watermark: i64,
    project_acl: HashMap<String, bool>,
}

/// State shared between the reader and writer halves of one connection
pub struct ConnectionSession {
    id: String,
    principal: Principal,
    is_operator: bool,
    repository: Arc<dyn RealtimeEventRepository>,
    inner: RwLock<SessionInner>,
    replay_generation: AtomicU64,
}

impl fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("id", &self.id)
            .field("principal", &self.principal)
            .field("inner", &*self.inner.read())
            .finish()
    }
}

impl ConnectionSession {
    pub fn new(
        id: impl Into<String>,
        principal: Principal,
        filter: SubscriptionFilter,
        last_event_id: i64,
        repository: Arc<dyn RealtimeEventRepository>,
    ) -> Self {
        let principal = Principal {
            user_id: principal.user_id.trim().to_string(),
            ..principal
        };
        Self {
            id: id.into(),
            is_operator: principal.is_platform_operator(),
            principal,
            repository,
            inner: RwLock::new(SessionInner {
                state: SessionState::Connecting,
                filter: filter.normalize(),
                watermark: last_event_id.max(0),
                project_acl: HashMap::new(),
            }),
            replay_generation: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn repository(&self) -> Arc<dyn RealtimeEventRepository> {
        self.repository.clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner.read().state
    }

    pub fn transition(&self, next: SessionState) {
        let previous = {
            let mut inner = self.inner.write();
            std::mem::replace(&mut inner.state, next)
        };
        if previous != next {
            debug!(session_id = %self.id, from = %previous, to = %next, "Session state changed");
        }
    }

    pub fn filter(&self) -> SubscriptionFilter {
        self.inner.read().filter.clone()
    }

    pub fn replace_filter(&self, filter: SubscriptionFilter) {
        self.inner.write().filter = filter.normalize();
    }

    pub fn watermark(&self) -> i64 {
        self.inner.read().watermark
    }

    /// Raise the watermark. Non-positive and lower values are ignored.
    pub fn advance_watermark(&self, id: i64) {
        if id <= 0 {
            return;
        }
        let mut inner = self.inner.write();
        if id > inner.watermark {
            inner.watermark = id;
        }
    }

    pub fn replay_generation(&self) -> u64 {
        self.replay_generation.load(Ordering::SeqCst)
    }

    /// Start a new replay generation, superseding any pass still running.
    pub fn bump_replay_generation(&self) -> u64 {
        self.replay_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether the event may be shown to this principal.
    ///
    /// Membership answers are memoized per project for the lifetime of the
    /// session; store failures deny without caching.
    pub async fn is_allowed(&self, event: &RealtimeEvent) -> bool {
        if self.is_operator {
            return true;
        }
        let project_id = event.project_id.trim();
        if project_id.is_empty() {
            return false;
        }

        if let Some(allowed) = self.inner.read().project_acl.get(project_id) {
            return *allowed;
        }

        match self
            .repository
            .user_has_project_access(project_id, &self.principal.user_id)
            .await
        {
            Ok(allowed) => {
                self.inner
                    .write()
                    .project_acl
                    .insert(project_id.to_string(), allowed);
                allowed
            }
            Err(e) => {
                warn!(session_id = %self.id, project_id = %project_id, error = %e, "Project access check failed");
                false
            }
        }
    }

    /// Authorization followed by the current filter.
    pub async fn accepts(&self, event: &RealtimeEvent) -> bool {
        self.is_allowed(event).await && self.filter().matches(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_server_infrastructure::persistence::InMemoryRealtimeEventRepository;

    fn session_for(
        principal: Principal,
        repo: Arc<InMemoryRealtimeEventRepository>,
    ) -> ConnectionSession {
        ConnectionSession::new("s-1", principal, SubscriptionFilter::default(), 0, repo)
    }

    #[test]
    fn test_watermark_never_regresses() {
        let repo = Arc::new(InMemoryRealtimeEventRepository::new());
        let session = ConnectionSession::new(
            "s-1",
            Principal::user("u1"),
            SubscriptionFilter::default(),
            10,
            repo,
        );

        session.advance_watermark(5);
        session.advance_watermark(-1);
        session.advance_watermark(0);
        assert_eq!(session.watermark(), 10);

        session.advance_watermark(12);
        assert_eq!(session.watermark(), 12);
    }

    #[test]
    fn test_initial_filter_is_normalized() {
        let repo = Arc::new(InMemoryRealtimeEventRepository::new());
        let session = session_for(Principal::user("u1"), repo);
        assert_eq!(session.filter().topics.len(), 6);
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[tokio::test]
    async fn test_operator_sees_everything_without_lookups() {
        let repo = Arc::new(InMemoryRealtimeEventRepository::new());
        let session = session_for(Principal::owner("root"), repo.clone());

        assert!(session.is_allowed(&RealtimeEvent::new(1, "run.events")).await);
        assert!(
            session
                .is_allowed(&RealtimeEvent::new(2, "run.events").with_project("p9"))
                .await
        );
        assert_eq!(repo.access_queries(), 0);
    }

    #[tokio::test]
    async fn test_membership_is_memoized_per_project() {
        let repo = Arc::new(InMemoryRealtimeEventRepository::new());
        repo.add_member("p1", "u1");
        let session = session_for(Principal::user("u1"), repo.clone());

        for id in 1..=5 {
            let event = RealtimeEvent::new(id, "run.logs").with_project("p1");
            assert!(session.is_allowed(&event).await);
        }
        assert!(
            !session
                .is_allowed(&RealtimeEvent::new(6, "run.logs").with_project("p2"))
                .await
        );
        assert_eq!(repo.access_queries(), 2);

        // membership changes are not observed for the lifetime of the session
        repo.remove_member("p1", "u1");
        assert!(
            session
                .is_allowed(&RealtimeEvent::new(7, "run.logs").with_project("p1"))
                .await
        );
        assert_eq!(repo.access_queries(), 2);
    }

    #[tokio::test]
    async fn test_unscoped_events_hidden_from_members() {
        let repo = Arc::new(InMemoryRealtimeEventRepository::new());
        let session = session_for(Principal::user("u1"), repo.clone());

        assert!(!session.is_allowed(&RealtimeEvent::new(1, "system.errors")).await);
        assert_eq!(repo.access_queries(), 0);
    }

    #[tokio::test]
    async fn test_store_errors_deny_without_caching() {
        let repo = Arc::new(InMemoryRealtimeEventRepository::new());
        repo.add_member("p1", "u1");
        repo.set_fail_reads(true);
        let session = session_for(Principal::user("u1"), repo.clone());
        let event = RealtimeEvent::new(1, "run.logs").with_project("p1");

        assert!(!session.is_allowed(&event).await);
        repo.set_fail_reads(false);
        assert!(session.is_allowed(&event).await);
        assert_eq!(repo.access_queries(), 2);
    }

    #[test]
    fn test_replay_generation() {
        let repo = Arc::new(InMemoryRealtimeEventRepository::new());
        let session = session_for(Principal::user("u1"), repo);
        assert_eq!(session.replay_generation(), 0);
        assert_eq!(session.bump_replay_generation(), 1);
        assert_eq!(session.bump_replay_generation(), 2);
        assert_eq!(session.replay_generation(), 2);
    }
}
