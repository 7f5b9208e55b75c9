//! PostgreSQL Realtime Event Repository
//!
//! Read side of the `realtime_events` log plus the `project_members`
//! membership lookup used for per-project authorization.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, postgres::PgPool};

use beacon_server_domain::realtime::{
    RealtimeEvent, RealtimeEventRepository, normalize_list_window,
};
use beacon_server_domain::shared_kernel::{DomainError, Result};

const SELECT_COLUMNS: &str = r#"
    SELECT id,
           COALESCE(topic, '') AS topic,
           COALESCE(scope, '{}'::jsonb) AS scope,
           COALESCE(payload, '{}'::jsonb) AS payload,
           COALESCE(correlation_id, '') AS correlation_id,
           COALESCE(project_id, '') AS project_id,
           COALESCE(run_id, '') AS run_id,
           COALESCE(task_id, '') AS task_id,
           created_at
    FROM realtime_events
"#;

#[derive(Clone, Debug)]
pub struct PostgresRealtimeEventRepository {
    pool: Option<PgPool>,
}

impl PostgresRealtimeEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Some(pool) }
    }

    /// Repository without a pool; every round trip fails with `NotConfigured`.
    pub fn unconfigured() -> Self {
        Self { pool: None }
    }

    fn pool(&self) -> Result<&PgPool> {
        self.pool.as_ref().ok_or(DomainError::NotConfigured)
    }

    /// Create the event log and membership tables when missing.
    pub async fn ensure_schema(&self) -> Result<()> {
        let pool = self.pool()?;
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS realtime_events (
                id BIGSERIAL PRIMARY KEY,
                topic TEXT NOT NULL,
                scope JSONB NOT NULL DEFAULT '{}'::jsonb,
                payload JSONB NOT NULL DEFAULT '{}'::jsonb,
                correlation_id TEXT NOT NULL DEFAULT '',
                project_id TEXT NOT NULL DEFAULT '',
                run_id TEXT NOT NULL DEFAULT '',
                task_id TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_realtime_events_created_at ON realtime_events (created_at)",
            r#"
            CREATE TABLE IF NOT EXISTS project_members (
                project_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                PRIMARY KEY (project_id, user_id)
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(pool)
                .await
                .map_err(|e| DomainError::InfrastructureError {
                    message: format!("ensure realtime schema: {}", e),
                })?;
        }

        Ok(())
    }

    fn row_to_event(row: &sqlx::postgres::PgRow) -> RealtimeEvent {
        RealtimeEvent {
            id: row.get("id"),
            topic: row.get("topic"),
            scope: row.get("scope"),
            payload: row.get("payload"),
            correlation_id: row.get("correlation_id"),
            project_id: row.get("project_id"),
            run_id: row.get("run_id"),
            task_id: row.get("task_id"),
            created_at: row.get("created_at"),
        }
        .trimmed()
    }
}

#[async_trait]
impl RealtimeEventRepository for PostgresRealtimeEventRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<RealtimeEvent>> {
        let pool = self.pool()?;
        if id <= 0 {
            return Ok(None);
        }

        let row = sqlx::query(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| DomainError::InfrastructureError {
                message: format!("get realtime event id={}: {}", id, e),
            })?;

        Ok(row.as_ref().map(Self::row_to_event))
    }

    async fn list_after_id(&self, after_id: i64, limit: i64) -> Result<Vec<RealtimeEvent>> {
        let pool = self.pool()?;
        let (after_id, limit) = normalize_list_window(after_id, limit);

        let rows = sqlx::query(&format!(
            "{} WHERE id > $1 ORDER BY id ASC LIMIT $2",
            SELECT_COLUMNS
        ))
        .bind(after_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(|e| DomainError::InfrastructureError {
            message: format!("list realtime events after id={}: {}", after_id, e),
        })?;

        Ok(rows.iter().map(Self::row_to_event).collect())
    }

    async fn user_has_project_access(&self, project_id: &str, user_id: &str) -> Result<bool> {
        let pool = self.pool()?;
        let project_id = project_id.trim();
        let user_id = user_id.trim();
        if project_id.is_empty() || user_id.is_empty() {
            return Ok(false);
        }

        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM project_members WHERE project_id = $1 AND user_id = $2
            ) AS allowed
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(|e| DomainError::InfrastructureError {
            message: format!(
                "check project access project_id={} user_id={}: {}",
                project_id, user_id, e
            ),
        })?;

        Ok(row.get("allowed"))
    }

    async fn cleanup_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let pool = self.pool()?;

        let result = sqlx::query("DELETE FROM realtime_events WHERE created_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await
            .map_err(|e| DomainError::InfrastructureError {
                message: format!("cleanup realtime events before {}: {}", cutoff.to_rfc3339(), e),
            })?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_repository_reports_not_configured() {
        let repo = PostgresRealtimeEventRepository::unconfigured();

        assert!(matches!(
            repo.get_by_id(1).await,
            Err(DomainError::NotConfigured)
        ));
        assert!(matches!(
            repo.list_after_id(0, 10).await,
            Err(DomainError::NotConfigured)
        ));
        assert!(matches!(
            repo.cleanup_older_than(Utc::now()).await,
            Err(DomainError::NotConfigured)
        ));
        assert!(matches!(
            repo.ensure_schema().await,
            Err(DomainError::NotConfigured)
        ));
    }
}
