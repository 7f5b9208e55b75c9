//! Graceful Shutdown Module
//!
//! Implements coordinated shutdown for the gateway with:
//! - Signal handlers (SIGTERM, SIGINT)
//! - A root cancellation token shared by the broker and every session
//! - Bounded draining of the broker background tasks

use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use beacon_server_infrastructure::realtime::RealtimeBroker;

/// Shutdown configuration
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Maximum time to wait for the broker to drain
    pub timeout: Duration,
    /// Enable signal handlers
    pub enable_signals: bool,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            enable_signals: true,
        }
    }
}

impl ShutdownConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Graceful shutdown coordinator
///
/// Cancelling the root token stops the listener, the retention worker and
/// all sessions (they hold child tokens). The watch channel records why.
#[derive(Clone)]
pub struct GracefulShutdown {
    token: CancellationToken,
    state_tx: Arc<watch::Sender<ShutdownState>>,
    config: Arc<ShutdownConfig>,
}

impl GracefulShutdown {
    pub fn new(config: ShutdownConfig) -> Self {
        let (state_tx, _) = watch::channel(ShutdownState::Running);
        Self {
            token: CancellationToken::new(),
            state_tx: Arc::new(state_tx),
            config: Arc::new(config),
        }
    }

    /// Root token; cancelled exactly when shutdown starts.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Trigger shutdown programmatically
    pub fn shutdown(&self, reason: ShutdownReason) {
        if self.is_shutting_down() {
            return;
        }
        info!("Triggering shutdown: {}", reason);
        self.state_tx.send_replace(ShutdownState::ShuttingDown(reason));
        self.token.cancel();
    }

    /// Wait until shutdown is triggered and return the reason.
    pub async fn wait_for_signal(&self) -> ShutdownReason {
        self.token.cancelled().await;
        match self.state() {
            ShutdownState::ShuttingDown(reason) => reason,
            _ => ShutdownReason::Unknown,
        }
    }

    /// Get current state
    pub fn state(&self) -> ShutdownState {
        self.state_tx.borrow().clone()
    }

    /// Check if shutdown has been initiated
    pub fn is_shutting_down(&self) -> bool {
        !matches!(*self.state_tx.borrow(), ShutdownState::Running)
    }

    fn complete(&self) {
        self.state_tx.send_replace(ShutdownState::Completed);
    }
}

/// Reason for shutdown
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    /// SIGTERM signal received
    SigTerm,
    /// SIGINT signal received (Ctrl+C)
    SigInt,
    /// programmatic shutdown
    Programmatic(String),
    /// Unknown reason
    Unknown,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::SigTerm => write!(f, "SIGTERM"),
            ShutdownReason::SigInt => write!(f, "SIGINT (Ctrl+C)"),
            ShutdownReason::Programmatic(reason) => write!(f, "Programmatic: {}", reason),
            ShutdownReason::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Shutdown state
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownState {
    Running,
    ShuttingDown(ShutdownReason),
    Completed,
}

/// Stop the broker within the configured timeout.
///
/// Triggers shutdown first if nothing else has, so the broker tasks and any
/// remaining sessions see their tokens cancelled. Returns false on timeout.
pub async fn drain(coordinator: &GracefulShutdown, broker: &RealtimeBroker) -> bool {
    coordinator.shutdown(ShutdownReason::Programmatic("drain".to_string()));

    info!(
        subscribers = broker.subscriber_count(),
        "Draining realtime broker"
    );
    let drained = match timeout(coordinator.config.timeout, broker.stop()).await {
        Ok(()) => {
            info!("Realtime broker stopped");
            true
        }
        Err(_) => {
            warn!(
                "Realtime broker did not stop within {:?}",
                coordinator.config.timeout
            );
            false
        }
    };

    coordinator.complete();
    drained
}

/// Start signal handler that triggers graceful shutdown
pub fn start_signal_handler(coordinator: &GracefulShutdown) {
    if !coordinator.config.enable_signals {
        return;
    }

    let coordinator = coordinator.clone();

    tokio::spawn(async move {
        let ctrl_c = async {
            match signal::ctrl_c().await {
                Ok(()) => ShutdownReason::SigInt,
                Err(e) => {
                    tracing::error!("Failed to register ctrl-c handler: {}", e);
                    std::future::pending::<ShutdownReason>().await
                }
            }
        };

        let term = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sig) => {
                        sig.recv().await;
                        ShutdownReason::SigTerm
                    }
                    Err(e) => {
                        tracing::error!("Failed to register SIGTERM handler: {}", e);
                        std::future::pending::<ShutdownReason>().await
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<ShutdownReason>().await
            }
        };

        let reason = tokio::select! {
            reason = ctrl_c => reason,
            reason = term => reason,
            _ = coordinator.token.cancelled() => return,
        };
        coordinator.shutdown(reason);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_server_infrastructure::persistence::InMemoryRealtimeEventRepository;
    use beacon_server_infrastructure::realtime::{BrokerConfig, RealtimeMetrics};

    fn broker() -> RealtimeBroker {
        RealtimeBroker::new(
            Arc::new(InMemoryRealtimeEventRepository::new()),
            None,
            BrokerConfig::default(),
            RealtimeMetrics::new().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_graceful_shutdown_trigger() {
        let shutdown = GracefulShutdown::new(ShutdownConfig::default());

        let handle = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { shutdown.wait_for_signal().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.shutdown(ShutdownReason::Programmatic("Test".to_string()));

        let reason = handle.await.unwrap();
        assert!(matches!(reason, ShutdownReason::Programmatic(_)));
        assert!(shutdown.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_shutdown_state() {
        let shutdown = GracefulShutdown::new(ShutdownConfig::default());

        assert!(!shutdown.is_shutting_down());
        assert_eq!(shutdown.state(), ShutdownState::Running);

        shutdown.shutdown(ShutdownReason::SigInt);
        shutdown.shutdown(ShutdownReason::SigTerm);

        assert!(shutdown.is_shutting_down());
        assert_eq!(
            shutdown.state(),
            ShutdownState::ShuttingDown(ShutdownReason::SigInt)
        );
    }

    #[tokio::test]
    async fn test_drain_stops_broker() {
        let shutdown = GracefulShutdown::new(ShutdownConfig::default());
        let broker = broker();
        broker.start(shutdown.token());
        let (_events, _subscription) = broker.subscribe(8);
        assert!(broker.is_running());

        assert!(drain(&shutdown, &broker).await);

        assert!(!broker.is_running());
        assert_eq!(broker.subscriber_count(), 0);
        assert_eq!(shutdown.state(), ShutdownState::Completed);
    }
}
