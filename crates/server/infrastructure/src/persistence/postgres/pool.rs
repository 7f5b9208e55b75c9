//! PostgreSQL connection pool
//!
//! One pool per process. The event log repository and the LISTEN connector
//! both borrow connections from it.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use beacon_shared::config::DatabaseConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct DatabasePoolConfig {
    pub max_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for DatabasePoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl From<&DatabaseConfig> for DatabasePoolConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            max_connections: config.pool_size,
            connection_timeout: Duration::from_secs(config.connect_timeout_secs),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or the URL is invalid.
    pub async fn connect(url: &str, config: DatabasePoolConfig) -> Result<Self, PoolError> {
        info!(
            max = config.max_connections,
            timeout = ?config.connection_timeout,
            "Creating PostgreSQL pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connection_timeout)
            .idle_timeout(config.idle_timeout)
            .connect(url)
            .await
            .map_err(|e| PoolError::ConnectionFailed(e.to_string()))?;

        info!("PostgreSQL pool created successfully");

        Ok(Self { pool })
    }

    /// Get the inner `PgPool` for use with sqlx
    #[inline]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[inline]
    pub fn pg_pool(&self) -> PgPool {
        self.pool.clone()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),
}
