//! Startup module - orchestrates application initialization.
//!
//! Pool, event log, metrics registry, broker and router are built once here
//! and passed down explicitly.

pub mod shutdown;

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use beacon_server_domain::realtime::RealtimeEventRepository;
use beacon_server_infrastructure::messaging::{NotificationConnector, PgNotifyConnector};
use beacon_server_infrastructure::persistence::{
    DatabasePool, DatabasePoolConfig, PostgresRealtimeEventRepository,
};
use beacon_server_infrastructure::realtime::{BrokerConfig, RealtimeBroker, RealtimeMetrics};
use beacon_server_interface::websocket::{JwtConfig, JwtPrincipalResolver, WebSocketState};
use beacon_shared::config::ServerConfigDto;

use shutdown::{GracefulShutdown, ShutdownConfig, drain, start_signal_handler};

/// Current application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Flags that only affect startup
#[derive(Debug, Clone, Default)]
pub struct StartupOptions {
    pub bootstrap_schema: bool,
}

/// Application state containing all initialized components.
#[derive(Clone)]
pub struct AppState {
    pub pool: DatabasePool,
    pub broker: RealtimeBroker,
    pub registry: Arc<prometheus::Registry>,
}

/// Run the complete application startup sequence and serve until shutdown.
pub async fn run(config: ServerConfigDto, options: StartupOptions) -> anyhow::Result<()> {
    info!(
        "Starting Beacon realtime gateway v{} on {}",
        APP_VERSION, config.http.bind_address
    );

    let coordinator = GracefulShutdown::new(ShutdownConfig::default());
    start_signal_handler(&coordinator);

    // Step 1: Connect to database
    let pool = DatabasePool::connect(
        &config.database.url,
        DatabasePoolConfig::from(&config.database),
    )
    .await
    .context("Failed to connect to database")?;
    info!("✓ Database connected");

    // Step 2: Event log
    let repository = PostgresRealtimeEventRepository::new(pool.pg_pool());
    if options.bootstrap_schema {
        repository
            .ensure_schema()
            .await
            .context("Failed to bootstrap realtime schema")?;
        info!("✓ Realtime schema ready");
    }

    // Step 3: Broker and metrics
    let state = build_state(&config, pool, Arc::new(repository))?;
    if config.realtime.enabled {
        state.broker.start(coordinator.token());
        info!(channel = %state.broker.config().channel, "✓ Realtime broker started");
    } else {
        info!("Realtime broker disabled; sessions receive replay only");
    }

    // Step 4: HTTP / WebSocket
    let resolver = JwtPrincipalResolver::new(JwtConfig::new(
        config.auth.jwt_secret.clone(),
        config.auth.jwt_issuer.clone(),
    ));
    let ws_state = WebSocketState::new(
        state.broker.clone(),
        Arc::new(resolver),
        coordinator.token().clone(),
    );
    let app = beacon_server_interface::router(ws_state, state.registry.clone());

    let listener = tokio::net::TcpListener::bind(config.http.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.http.bind_address))?;
    info!("✓ Listening on {}", config.http.bind_address);

    let token = coordinator.token().clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .context("HTTP server failed")?;

    drain(&coordinator, &state.broker).await;
    state.pool.close().await;
    info!("Shutdown complete");

    Ok(())
}

/// Wire the broker to the event log and register its metrics.
fn build_state(
    config: &ServerConfigDto,
    pool: DatabasePool,
    repository: Arc<dyn RealtimeEventRepository>,
) -> anyhow::Result<AppState> {
    let registry = prometheus::Registry::new();
    let metrics = RealtimeMetrics::new().context("Failed to create realtime metrics")?;
    metrics
        .register(&registry)
        .context("Failed to register realtime metrics")?;

    let connector: Arc<dyn NotificationConnector> =
        Arc::new(PgNotifyConnector::new(pool.pg_pool()));
    let broker = RealtimeBroker::new(
        repository,
        Some(connector),
        BrokerConfig::from(&config.realtime),
        metrics,
    );

    Ok(AppState {
        pool,
        broker,
        registry: Arc::new(registry),
    })
}
