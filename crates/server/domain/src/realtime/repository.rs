use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::event::RealtimeEvent;
use crate::shared_kernel::Result;

/// Page size used when the caller passes a non-positive limit.
pub const DEFAULT_LIST_LIMIT: i64 = 200;
/// Upper bound for one `list_after_id` page.
pub const MAX_LIST_LIMIT: i64 = 2000;

/// Clamps a `(after_id, limit)` pair to the accepted range.
pub fn normalize_list_window(after_id: i64, limit: i64) -> (i64, i64) {
    let after_id = after_id.max(0);
    let limit = if limit <= 0 {
        DEFAULT_LIST_LIMIT
    } else {
        limit.min(MAX_LIST_LIMIT)
    };
    (after_id, limit)
}

/// Access to the durable realtime event log and project membership
#[async_trait]
pub trait RealtimeEventRepository: Send + Sync {
    /// Fetch one event. Non-positive ids and missing rows yield `None`.
    async fn get_by_id(&self, id: i64) -> Result<Option<RealtimeEvent>>;

    /// Events with `id > after_id`, ascending by id.
    async fn list_after_id(&self, after_id: i64, limit: i64) -> Result<Vec<RealtimeEvent>>;

    /// Membership check. Blank inputs yield `false`.
    async fn user_has_project_access(&self, project_id: &str, user_id: &str) -> Result<bool>;

    /// Delete events created before `cutoff`, returning the number removed.
    async fn cleanup_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_list_window() {
        assert_eq!(normalize_list_window(-5, 10), (0, 10));
        assert_eq!(normalize_list_window(7, 0), (7, DEFAULT_LIST_LIMIT));
        assert_eq!(normalize_list_window(7, -1), (7, DEFAULT_LIST_LIMIT));
        assert_eq!(normalize_list_window(7, 5000), (7, MAX_LIST_LIMIT));
        assert_eq!(normalize_list_window(7, 400), (7, 400));
    }
}
