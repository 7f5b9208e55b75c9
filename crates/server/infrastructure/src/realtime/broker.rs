//! Realtime Broker
//!
//! In-process fan-out from the notification listener to connection
//! sessions. Each subscriber owns a bounded queue; a slow subscriber loses
//! events instead of slowing down everybody else, and recovers them through
//! replay from the event log.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use beacon_server_domain::realtime::{RealtimeEvent, RealtimeEventRepository};
use beacon_shared::DEFAULT_NOTIFY_CHANNEL;
use beacon_shared::config::RealtimeConfig;

use super::cleanup::RetentionWorker;
use super::listener::NotificationListener;
use super::metrics::RealtimeMetrics;
use crate::messaging::backoff::BackoffConfig;
use crate::messaging::pg_notify_listener::NotificationConnector;

/// Queue size used when a caller asks for a zero sized buffer.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;
/// Queue size requested by connection sessions.
pub const SESSION_SUBSCRIBER_BUFFER: usize = 128;

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub channel: String,
    pub cleanup_interval: Duration,
    pub retention: Duration,
    pub backoff: BackoffConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::from(&RealtimeConfig::default())
    }
}

impl From<&RealtimeConfig> for BrokerConfig {
    fn from(config: &RealtimeConfig) -> Self {
        let channel = config.channel.trim();
        Self {
            channel: if channel.is_empty() {
                DEFAULT_NOTIFY_CHANNEL.to_string()
            } else {
                channel.to_string()
            },
            cleanup_interval: config.cleanup_interval(),
            retention: config.retention(),
            backoff: BackoffConfig::default(),
        }
    }
}

/// Shared handle to the broker. Clones refer to the same registry.
#[derive(Clone)]
pub struct RealtimeBroker {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    repository: Arc<dyn RealtimeEventRepository>,
    connector: Option<Arc<dyn NotificationConnector>>,
    config: BrokerConfig,
    metrics: RealtimeMetrics,
    subscribers: RwLock<HashMap<u64, mpsc::Sender<RealtimeEvent>>>,
    next_subscriber_id: AtomicU64,
    running: Mutex<Option<Running>>,
}

struct Running {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for RealtimeBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeBroker")
            .field("channel", &self.inner.config.channel)
            .field("subscribers", &self.subscriber_count())
            .field("running", &self.is_running())
            .finish()
    }
}

impl RealtimeBroker {
    /// Without a connector the broker still fans out emitted events and runs
    /// retention, but nothing feeds it from the database.
    pub fn new(
        repository: Arc<dyn RealtimeEventRepository>,
        connector: Option<Arc<dyn NotificationConnector>>,
        config: BrokerConfig,
        metrics: RealtimeMetrics,
    ) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                repository,
                connector,
                config,
                metrics,
                subscribers: RwLock::new(HashMap::new()),
                next_subscriber_id: AtomicU64::new(1),
                running: Mutex::new(None),
            }),
        }
    }

    pub fn repository(&self) -> Arc<dyn RealtimeEventRepository> {
        self.inner.repository.clone()
    }

    pub fn metrics(&self) -> &RealtimeMetrics {
        &self.inner.metrics
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.inner.config
    }

    /// Register a new subscriber queue.
    pub fn subscribe(&self, buffer: usize) -> (mpsc::Receiver<RealtimeEvent>, Subscription) {
        let buffer = if buffer == 0 {
            DEFAULT_SUBSCRIBER_BUFFER
        } else {
            buffer
        };
        let (tx, rx) = mpsc::channel(buffer);
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::SeqCst);

        let count = {
            let mut subscribers = self.inner.subscribers.write();
            subscribers.insert(id, tx);
            subscribers.len()
        };
        self.inner.metrics.set_subscribers(count);
        debug!(subscriber_id = id, buffer, "Realtime subscriber registered");

        (
            rx,
            Subscription {
                id,
                broker: Arc::downgrade(&self.inner),
                detached: AtomicBool::new(false),
            },
        )
    }

    /// Offer an event to every subscriber without waiting.
    ///
    /// Returns the number of queues that accepted the event.
    pub fn emit(&self, event: &RealtimeEvent) -> usize {
        let subscribers = self.inner.subscribers.read();
        self.inner.metrics.record_emitted();

        let mut accepted = 0;
        for (id, tx) in subscribers.iter() {
            match tx.try_send(event.clone()) {
                Ok(()) => accepted += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.inner.metrics.record_dropped();
                    debug!(subscriber_id = id, event_id = event.id, "Subscriber queue full, event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        accepted
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.lock().is_some()
    }

    /// Spawn the notification listener and the retention worker.
    ///
    /// Calling `start` on a running broker does nothing.
    pub fn start(&self, parent: &CancellationToken) {
        let mut running = self.inner.running.lock();
        if running.is_some() {
            return;
        }

        let token = parent.child_token();
        let mut tasks = Vec::with_capacity(2);

        match &self.inner.connector {
            Some(connector) => {
                let listener = NotificationListener::new(
                    connector.clone(),
                    self.clone(),
                    self.inner.config.channel.clone(),
                    self.inner.config.backoff.clone(),
                );
                tasks.push(tokio::spawn(listener.run(token.clone())));
            }
            None => warn!("Realtime broker started without a notification connector"),
        }

        let retention = RetentionWorker::new(
            self.inner.repository.clone(),
            self.inner.config.cleanup_interval,
            self.inner.config.retention,
            self.inner.metrics.clone(),
        );
        tasks.push(tokio::spawn(retention.run(token.clone())));

        info!(channel = %self.inner.config.channel, "Realtime broker started");
        *running = Some(Running { token, tasks });
    }

    /// Close every subscriber queue and stop the background tasks.
    pub async fn stop(&self) {
        let running = self.inner.running.lock().take();

        let closed = {
            let mut subscribers = self.inner.subscribers.write();
            let closed = subscribers.len();
            subscribers.clear();
            closed
        };
        self.inner.metrics.set_subscribers(0);

        if let Some(running) = running {
            running.token.cancel();
            for task in running.tasks {
                if let Err(e) = task.await {
                    warn!(error = %e, "Realtime background task ended abnormally");
                }
            }
            info!(subscribers_closed = closed, "Realtime broker stopped");
        }
    }
}

impl BrokerInner {
    fn unsubscribe(&self, id: u64) {
        let count = {
            let mut subscribers = self.subscribers.write();
            subscribers.remove(&id);
            subscribers.len()
        };
        self.metrics.set_subscribers(count);
        debug!(subscriber_id = id, "Realtime subscriber detached");
    }
}

/// Registration guard for one subscriber queue. Detaches on drop.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    broker: Weak<BrokerInner>,
    detached: AtomicBool,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the queue from the broker. Safe to call more than once.
    pub fn detach(&self) {
        if self.detached.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(broker) = self.broker.upgrade() {
            broker.unsubscribe(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
