//! In-memory realtime event log
//!
//! Backs tests and local runs without PostgreSQL. Mirrors the clamping and
//! trimming rules of the PostgreSQL adapter and counts membership lookups so
//! callers can assert on caching.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use beacon_server_domain::realtime::{
    RealtimeEvent, RealtimeEventRepository, normalize_list_window,
};
use beacon_server_domain::shared_kernel::{DomainError, Result};

#[derive(Debug, Default)]
pub struct InMemoryRealtimeEventRepository {
    events: RwLock<BTreeMap<i64, RealtimeEvent>>,
    members: RwLock<HashSet<(String, String)>>,
    next_id: AtomicU64,
    access_queries: AtomicU64,
    fail_reads: AtomicBool,
}

impl InMemoryRealtimeEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, assigning the next id. Returns the stored event.
    pub fn append(&self, event: RealtimeEvent) -> RealtimeEvent {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        let event = RealtimeEvent { id, ..event }.trimmed();
        self.events.write().insert(id, event.clone());
        event
    }

    pub fn add_member(&self, project_id: &str, user_id: &str) {
        self.members
            .write()
            .insert((project_id.to_string(), user_id.to_string()));
    }

    pub fn remove_member(&self, project_id: &str, user_id: &str) {
        self.members
            .write()
            .remove(&(project_id.to_string(), user_id.to_string()));
    }

    /// Number of membership lookups that reached the store.
    pub fn access_queries(&self) -> u64 {
        self.access_queries.load(Ordering::SeqCst)
    }

    /// Make every subsequent read fail with an infrastructure error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    fn check_reads(&self, operation: &str) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DomainError::InfrastructureError {
                message: format!("{}: store unavailable", operation),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RealtimeEventRepository for InMemoryRealtimeEventRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<RealtimeEvent>> {
        if id <= 0 {
            return Ok(None);
        }
        self.check_reads(&format!("get realtime event id={}", id))?;
        Ok(self.events.read().get(&id).cloned())
    }

    async fn list_after_id(&self, after_id: i64, limit: i64) -> Result<Vec<RealtimeEvent>> {
        let (after_id, limit) = normalize_list_window(after_id, limit);
        self.check_reads(&format!("list realtime events after id={}", after_id))?;

        Ok(self
            .events
            .read()
            .range((Bound::Excluded(after_id), Bound::Unbounded))
            .take(limit as usize)
            .map(|(_, event)| event.clone())
            .collect())
    }

    async fn user_has_project_access(&self, project_id: &str, user_id: &str) -> Result<bool> {
        let project_id = project_id.trim();
        let user_id = user_id.trim();
        if project_id.is_empty() || user_id.is_empty() {
            return Ok(false);
        }
        self.access_queries.fetch_add(1, Ordering::SeqCst);
        self.check_reads("check project access")?;

        Ok(self
            .members
            .read()
            .contains(&(project_id.to_string(), user_id.to_string())))
    }

    async fn cleanup_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut events = self.events.write();
        let before = events.len();
        events.retain(|_, event| event.created_at >= cutoff);
        Ok((before - events.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn seeded(count: usize) -> InMemoryRealtimeEventRepository {
        let repo = InMemoryRealtimeEventRepository::new();
        for _ in 0..count {
            repo.append(RealtimeEvent::new(0, "run.events"));
        }
        repo
    }

    #[tokio::test]
    async fn test_list_after_id_is_ascending_and_exclusive() {
        let repo = seeded(5);

        let page = repo.list_after_id(2, 10).await.unwrap();
        let ids: Vec<i64> = page.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_list_after_max_id_is_empty() {
        let repo = seeded(3);
        assert!(repo.list_after_id(i64::MAX, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_after_id_clamps_window() {
        let repo = seeded(250);

        assert_eq!(repo.list_after_id(-10, 0).await.unwrap().len(), 200);
        assert_eq!(repo.list_after_id(-10, 0).await.unwrap()[0].id, 1);
        assert_eq!(repo.list_after_id(0, 5000).await.unwrap().len(), 250);
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let repo = seeded(1);

        assert!(repo.get_by_id(1).await.unwrap().is_some());
        assert!(repo.get_by_id(2).await.unwrap().is_none());
        assert!(repo.get_by_id(0).await.unwrap().is_none());
        assert!(repo.get_by_id(-3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_project_access_blank_inputs_skip_store() {
        let repo = InMemoryRealtimeEventRepository::new();
        repo.add_member("p1", "u1");

        assert!(!repo.user_has_project_access(" ", "u1").await.unwrap());
        assert!(!repo.user_has_project_access("p1", "").await.unwrap());
        assert_eq!(repo.access_queries(), 0);

        assert!(repo.user_has_project_access(" p1 ", "u1").await.unwrap());
        assert!(!repo.user_has_project_access("p2", "u1").await.unwrap());
        assert_eq!(repo.access_queries(), 2);
    }

    #[tokio::test]
    async fn test_cleanup_older_than() {
        let repo = InMemoryRealtimeEventRepository::new();
        let now = Utc::now();
        repo.append(RealtimeEvent::new(0, "run.logs").with_created_at(now - Duration::hours(80)));
        repo.append(RealtimeEvent::new(0, "run.logs").with_created_at(now - Duration::hours(1)));

        let deleted = repo.cleanup_older_than(now - Duration::hours(72)).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_fail_reads() {
        let repo = seeded(1);
        repo.set_fail_reads(true);

        let err = repo.list_after_id(0, 10).await.unwrap_err();
        assert!(err.to_string().contains("list realtime events after id=0"));
    }
}
