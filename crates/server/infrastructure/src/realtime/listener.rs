//! Notification Listener
//!
//! Holds a LISTEN session on the realtime channel, resolves each
//! notification payload (a decimal event id) against the event log and hands
//! the event to the broker. Connection failures are retried forever with a
//! capped exponential backoff until the token is cancelled.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::broker::RealtimeBroker;
use crate::messaging::backoff::{Backoff, BackoffConfig};
use crate::messaging::pg_notify_listener::{NotificationConnector, NotificationStream};

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("LISTEN connect failed: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("LISTEN receive failed: {0}")]
    Receive(#[source] sqlx::Error),
}

pub struct NotificationListener {
    connector: Arc<dyn NotificationConnector>,
    broker: RealtimeBroker,
    channel: String,
    backoff: BackoffConfig,
}

/// Parse a notification payload into a positive event id.
pub fn parse_event_id(payload: &str) -> Option<i64> {
    payload.trim().parse::<i64>().ok().filter(|id| *id > 0)
}

impl NotificationListener {
    pub fn new(
        connector: Arc<dyn NotificationConnector>,
        broker: RealtimeBroker,
        channel: String,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            connector,
            broker,
            channel,
            backoff,
        }
    }

    pub async fn run(self, token: CancellationToken) {
        let mut backoff = Backoff::new(self.backoff.clone());

        loop {
            let connected = tokio::select! {
                _ = token.cancelled() => break,
                result = self.connector.connect(&self.channel) => result.map_err(ListenerError::Connect),
            };

            let failure = match connected {
                Ok(mut stream) => {
                    backoff.reset();
                    info!(channel = %self.channel, "realtime LISTEN started");
                    match self.consume(stream.as_mut(), &token).await {
                        Ok(()) => break,
                        Err(e) => e,
                    }
                }
                Err(e) => e,
            };
            warn!(channel = %self.channel, error = %failure, "realtime LISTEN interrupted");

            self.broker.metrics().record_listener_reconnect();
            let delay = backoff.next_delay();
            debug!(delay = ?delay, "realtime LISTEN reconnect scheduled");
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(channel = %self.channel, "realtime LISTEN stopped");
    }

    /// Returns `Ok(())` on cancellation and the receive error otherwise.
    async fn consume(
        &self,
        stream: &mut dyn NotificationStream,
        token: &CancellationToken,
    ) -> Result<(), ListenerError> {
        loop {
            let payload = tokio::select! {
                _ = token.cancelled() => return Ok(()),
                payload = stream.recv() => payload.map_err(ListenerError::Receive)?,
            };
            self.handle_payload(&payload).await;
        }
    }

    async fn handle_payload(&self, payload: &str) {
        let Some(id) = parse_event_id(payload) else {
            self.broker.metrics().record_invalid_notification();
            warn!(payload = %payload, "invalid realtime notification payload");
            return;
        };

        match self.broker.repository().get_by_id(id).await {
            Ok(Some(event)) => {
                self.broker.emit(&event);
            }
            Ok(None) => debug!(event_id = id, "realtime event not found"),
            Err(e) => warn!(event_id = id, error = %e, "failed to load realtime event"),
        }
    }
}
