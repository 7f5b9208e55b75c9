//! Realtime Retention Worker
//!
//! Periodically deletes events older than the retention window from the
//! realtime event log.

use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use beacon_server_domain::realtime::RealtimeEventRepository;

use super::metrics::RealtimeMetrics;

pub struct RetentionWorker {
    repository: Arc<dyn RealtimeEventRepository>,
    interval: Duration,
    retention: Duration,
    metrics: RealtimeMetrics,
}

impl RetentionWorker {
    pub fn new(
        repository: Arc<dyn RealtimeEventRepository>,
        interval: Duration,
        retention: Duration,
        metrics: RealtimeMetrics,
    ) -> Self {
        Self {
            repository,
            interval,
            retention,
            metrics,
        }
    }

    pub async fn run(self, token: CancellationToken) {
        info!(
            interval = ?self.interval,
            retention = ?self.retention,
            "Starting realtime retention worker"
        );

        // First tick is one interval out so startup never deletes.
        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Realtime retention worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.cleanup_once().await;
                }
            }
        }
    }

    /// Run one retention pass. Returns the number of events removed.
    ///
    /// A window reaching past the representable time range keeps everything.
    pub async fn cleanup_once(&self) -> u64 {
        let Some(cutoff) = chrono::Duration::from_std(self.retention)
            .ok()
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
        else {
            warn!(retention = ?self.retention, "Retention window out of range, skipping pass");
            return 0;
        };

        match self.repository.cleanup_older_than(cutoff).await {
            Ok(deleted) => {
                if deleted > 0 {
                    self.metrics.record_cleanup_deleted(deleted);
                    info!(
                        deleted,
                        cutoff = %cutoff.to_rfc3339_opts(SecondsFormat::Secs, true),
                        "Realtime events cleaned up"
                    );
                }
                deleted
            }
            Err(e) => {
                warn!(error = %e, "Realtime retention pass failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::in_memory::InMemoryRealtimeEventRepository;
    use beacon_server_domain::realtime::RealtimeEvent;

    fn seeded() -> Arc<InMemoryRealtimeEventRepository> {
        let repo = Arc::new(InMemoryRealtimeEventRepository::new());
        let now = Utc::now();
        repo.append(RealtimeEvent::new(0, "run.logs").with_created_at(now - chrono::Duration::hours(100)));
        repo.append(RealtimeEvent::new(0, "run.logs").with_created_at(now));
        repo
    }

    #[tokio::test]
    async fn test_cleanup_once_removes_expired_events() {
        let repo = seeded();
        let metrics = RealtimeMetrics::new().unwrap();
        let worker = RetentionWorker::new(
            repo.clone(),
            Duration::from_secs(600),
            Duration::from_secs(72 * 3600),
            metrics.clone(),
        );

        assert_eq!(worker.cleanup_once().await, 1);
        assert_eq!(repo.len(), 1);
        assert_eq!(metrics.snapshot().cleanup_deleted_total, 1);
    }

    #[tokio::test]
    async fn test_out_of_range_retention_keeps_everything() {
        let repo = seeded();
        let metrics = RealtimeMetrics::new().unwrap();
        for retention in [
            Duration::from_secs(1_000_000_000_000 * 3600),
            Duration::from_secs(u64::MAX),
            Duration::MAX,
        ] {
            let worker = RetentionWorker::new(
                repo.clone(),
                Duration::from_secs(600),
                retention,
                metrics.clone(),
            );
            assert_eq!(worker.cleanup_once().await, 0);
        }
        assert_eq!(repo.len(), 2);
        assert_eq!(metrics.snapshot().cleanup_deleted_total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_survives_out_of_range_retention() {
        let repo = seeded();
        let worker = RetentionWorker::new(
            repo.clone(),
            Duration::from_secs(600),
            Duration::from_secs(1_000_000_000_000 * 3600),
            RealtimeMetrics::new().unwrap(),
        );
        let token = CancellationToken::new();
        let handle = tokio::spawn(worker.run(token.clone()));

        tokio::time::sleep(Duration::from_secs(1801)).await;
        assert!(!handle.is_finished());
        assert_eq!(repo.len(), 2);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_skipped() {
        let repo = seeded();
        let worker = RetentionWorker::new(
            repo.clone(),
            Duration::from_secs(600),
            Duration::from_secs(72 * 3600),
            RealtimeMetrics::new().unwrap(),
        );
        let token = CancellationToken::new();
        let handle = tokio::spawn(worker.run(token.clone()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(repo.len(), 2);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(repo.len(), 1);

        token.cancel();
        handle.await.unwrap();
    }
}
