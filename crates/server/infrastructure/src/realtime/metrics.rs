//! Realtime Metrics
//!
//! Prometheus metrics for the broker fan-out, the LISTEN loop, the retention
//! worker and the WebSocket sessions.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Cheap to clone; all clones share the same collectors.
#[derive(Debug, Clone)]
pub struct RealtimeMetrics {
    inner: Arc<RealtimeMetricsInner>,
}

#[derive(Debug)]
struct RealtimeMetricsInner {
    sessions_active: IntGauge,
    sessions_total: IntCounter,
    subscribers_active: IntGauge,
    events_emitted_total: IntCounter,
    events_dropped_total: IntCounter,
    events_delivered_total: IntCounter,
    replayed_events_total: IntCounter,
    notifications_invalid_total: IntCounter,
    listener_reconnects_total: IntCounter,
    cleanup_deleted_total: IntCounter,
    session_duration_seconds: Histogram,
}

impl RealtimeMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            inner: Arc::new(RealtimeMetricsInner {
                sessions_active: IntGauge::new(
                    "realtime_sessions_active",
                    "Open realtime WebSocket sessions",
                )?,
                sessions_total: IntCounter::new(
                    "realtime_sessions_total",
                    "Realtime sessions opened",
                )?,
                subscribers_active: IntGauge::new(
                    "realtime_subscribers_active",
                    "Broker subscriber queues currently registered",
                )?,
                events_emitted_total: IntCounter::new(
                    "realtime_events_emitted_total",
                    "Events fanned out by the broker",
                )?,
                events_dropped_total: IntCounter::new(
                    "realtime_events_dropped_total",
                    "Events dropped because a subscriber queue was full",
                )?,
                events_delivered_total: IntCounter::new(
                    "realtime_events_delivered_total",
                    "Live events written to clients",
                )?,
                replayed_events_total: IntCounter::new(
                    "realtime_replayed_events_total",
                    "Events written to clients during replay",
                )?,
                notifications_invalid_total: IntCounter::new(
                    "realtime_notifications_invalid_total",
                    "Notification payloads that were not a positive event id",
                )?,
                listener_reconnects_total: IntCounter::new(
                    "realtime_listener_reconnects_total",
                    "LISTEN connection failures followed by a reconnect",
                )?,
                cleanup_deleted_total: IntCounter::new(
                    "realtime_cleanup_deleted_total",
                    "Events removed by the retention worker",
                )?,
                session_duration_seconds: Histogram::with_opts(HistogramOpts::new(
                    "realtime_session_duration_seconds",
                    "Realtime session duration in seconds",
                ))?,
            }),
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        let inner = &self.inner;
        registry.register(Box::new(inner.sessions_active.clone()))?;
        registry.register(Box::new(inner.sessions_total.clone()))?;
        registry.register(Box::new(inner.subscribers_active.clone()))?;
        registry.register(Box::new(inner.events_emitted_total.clone()))?;
        registry.register(Box::new(inner.events_dropped_total.clone()))?;
        registry.register(Box::new(inner.events_delivered_total.clone()))?;
        registry.register(Box::new(inner.replayed_events_total.clone()))?;
        registry.register(Box::new(inner.notifications_invalid_total.clone()))?;
        registry.register(Box::new(inner.listener_reconnects_total.clone()))?;
        registry.register(Box::new(inner.cleanup_deleted_total.clone()))?;
        registry.register(Box::new(inner.session_duration_seconds.clone()))?;
        Ok(())
    }

    pub fn session_opened(&self) {
        self.inner.sessions_active.inc();
        self.inner.sessions_total.inc();
    }

    pub fn session_closed(&self, duration_seconds: f64) {
        self.inner.sessions_active.dec();
        self.inner.session_duration_seconds.observe(duration_seconds);
    }

    pub fn set_subscribers(&self, count: usize) {
        self.inner.subscribers_active.set(count as i64);
    }

    pub fn record_emitted(&self) {
        self.inner.events_emitted_total.inc();
    }

    pub fn record_dropped(&self) {
        self.inner.events_dropped_total.inc();
    }

    pub fn record_delivered(&self) {
        self.inner.events_delivered_total.inc();
    }

    pub fn record_replayed(&self, count: u64) {
        self.inner.replayed_events_total.inc_by(count);
    }

    pub fn record_invalid_notification(&self) {
        self.inner.notifications_invalid_total.inc();
    }

    pub fn record_listener_reconnect(&self) {
        self.inner.listener_reconnects_total.inc();
    }

    pub fn record_cleanup_deleted(&self, count: u64) {
        self.inner.cleanup_deleted_total.inc_by(count);
    }

    pub fn snapshot(&self) -> RealtimeMetricsSnapshot {
        let inner = &self.inner;
        RealtimeMetricsSnapshot {
            sessions_active: inner.sessions_active.get(),
            sessions_total: inner.sessions_total.get(),
            subscribers_active: inner.subscribers_active.get(),
            events_emitted_total: inner.events_emitted_total.get(),
            events_dropped_total: inner.events_dropped_total.get(),
            events_delivered_total: inner.events_delivered_total.get(),
            replayed_events_total: inner.replayed_events_total.get(),
            notifications_invalid_total: inner.notifications_invalid_total.get(),
            listener_reconnects_total: inner.listener_reconnects_total.get(),
            cleanup_deleted_total: inner.cleanup_deleted_total.get(),
        }
    }
}

/// A snapshot of realtime metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RealtimeMetricsSnapshot {
    pub sessions_active: i64,
    pub sessions_total: u64,
    pub subscribers_active: i64,
    pub events_emitted_total: u64,
    pub events_dropped_total: u64,
    pub events_delivered_total: u64,
    pub replayed_events_total: u64,
    pub notifications_invalid_total: u64,
    pub listener_reconnects_total: u64,
    pub cleanup_deleted_total: u64,
}
