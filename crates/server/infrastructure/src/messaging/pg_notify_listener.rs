//! PgNotifyListener - PostgreSQL LISTEN/NOTIFY wrapper
//!
//! The realtime listener only needs "connect to a channel" and "receive the
//! next payload", so both are expressed as traits. Tests drive the listener
//! loop through a scripted connector instead of a database.

use async_trait::async_trait;
use sqlx::postgres::{PgListener, PgPool};
use tracing::debug;

/// A live LISTEN session on one channel.
#[async_trait]
pub trait NotificationStream: Send {
    /// Block until the next notification and return its payload.
    async fn recv(&mut self) -> Result<String, sqlx::Error>;
}

/// Opens LISTEN sessions.
#[async_trait]
pub trait NotificationConnector: Send + Sync {
    async fn connect(&self, channel: &str) -> Result<Box<dyn NotificationStream>, sqlx::Error>;
}

/// Wrapper for PostgreSQL LISTEN/NOTIFY mechanism.
#[derive(Debug)]
pub struct PgNotifyListener {
    listener: PgListener,
    channel: String,
}

impl PgNotifyListener {
    /// Create a new listener for a specific channel.
    pub async fn new(pool: &PgPool, channel: &str) -> Result<Self, sqlx::Error> {
        let mut listener = PgListener::connect_with(pool).await?;
        listener.listen(channel).await?;
        debug!(channel = %channel, "LISTEN registered");

        Ok(Self {
            listener,
            channel: channel.to_string(),
        })
    }

    /// Get the channel name.
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl NotificationStream for PgNotifyListener {
    async fn recv(&mut self) -> Result<String, sqlx::Error> {
        let notification = self.listener.recv().await?;
        Ok(notification.payload().to_string())
    }
}

/// Connector that opens a dedicated listener connection from the pool.
#[derive(Debug, Clone)]
pub struct PgNotifyConnector {
    pool: PgPool,
}

impl PgNotifyConnector {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationConnector for PgNotifyConnector {
    async fn connect(&self, channel: &str) -> Result<Box<dyn NotificationStream>, sqlx::Error> {
        let listener = PgNotifyListener::new(&self.pool, channel).await?;
        Ok(Box::new(listener))
    }
}
