//! Relay metrics for observability
//!
//! Runtime counters for monitoring relay health, served as JSON at /metrics.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Relay-wide metrics
#[derive(Debug, Default)]
pub struct RelayMetrics {
    // Connection metrics
    /// Currently active WebSocket connections
    pub active_connections: AtomicU64,
    /// Total connections since relay start
    pub total_connections: AtomicU64,
    /// Connections refused because the registry was at capacity
    pub connections_refused: AtomicU64,

    // Message metrics
    /// sendMessage events received from clients
    pub messages_received: AtomicU64,
    /// message events fanned out (counted once per broadcast, not per receiver)
    pub messages_broadcast: AtomicU64,
    /// Deliveries dropped because a client's send channel was full
    pub messages_dropped: AtomicU64,
    /// Inbound events dropped as malformed (unparseable or empty after trim)
    pub invalid_payloads: AtomicU64,
    /// sendMessage events dropped by the per-connection rate guard
    pub rate_limited: AtomicU64,

    /// typing events relayed
    pub typing_events: AtomicU64,

    /// Relay start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    // Connection tracking
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_refused(&self) {
        self.connections_refused.fetch_add(1, Ordering::Relaxed);
    }

    // Message tracking
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_broadcast(&self) {
        self.messages_broadcast.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn invalid_payload(&self) {
        self.invalid_payloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn typing_event(&self) {
        self.typing_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
                refused: self.connections_refused.load(Ordering::Relaxed),
            },
            messages: MessageMetrics {
                received: self.messages_received.load(Ordering::Relaxed),
                broadcast: self.messages_broadcast.load(Ordering::Relaxed),
                dropped: self.messages_dropped.load(Ordering::Relaxed),
                invalid: self.invalid_payloads.load(Ordering::Relaxed),
                rate_limited: self.rate_limited.load(Ordering::Relaxed),
            },
            typing_events: self.typing_events.load(Ordering::Relaxed),
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub messages: MessageMetrics,
    pub typing_events: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
    pub refused: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub received: u64,
    pub broadcast: u64,
    pub dropped: u64,
    pub invalid: u64,
    pub rate_limited: u64,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub connections: u64,
    pub uptime_secs: u64,
}
