//! Broadcast relay
//!
//! Every valid inbound event is fanned out to every registered connection,
//! including the one that sent it: the client renders its own messages from
//! the echoed broadcast, so suppressing the echo would silently break it.
//! Malformed events are dropped without any reply to the sender.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::identity::IdentityProvider;
use crate::metrics::RelayMetrics;
use crate::registry::{ConnectionId, ConnectionRegistry};
use scoutchat_proto::{ChatMessage, ClientEvent, ServerEvent};

pub struct ChatRelay {
    registry: ConnectionRegistry,
    identity: Arc<dyn IdentityProvider>,
    metrics: Arc<RelayMetrics>,
    config: RelayConfig,
}

impl ChatRelay {
    pub fn new(
        config: RelayConfig,
        identity: Arc<dyn IdentityProvider>,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            registry: ConnectionRegistry::new(config.max_connections),
            identity,
            metrics,
            config,
        }
    }

    pub fn metrics(&self) -> &Arc<RelayMetrics> {
        &self.metrics
    }

    /// Token-bucket guard for this relay's configured message rate, one per
    /// connection.
    pub fn rate_guard(&self) -> RateGuard {
        RateGuard::new(self.config.message_rate_per_sec, self.config.message_burst)
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.len().await
    }

    /// Register a new connection and hand back its event receiver. On a full
    /// registry the connection is refused and nothing is broadcast.
    pub async fn connect(&self) -> Result<(ConnectionId, mpsc::Receiver<ServerEvent>), RelayError> {
        let (tx, rx) = mpsc::channel(self.config.send_channel_capacity);
        match self.registry.register(tx).await {
            Ok(id) => Ok((id, rx)),
            Err(e) => {
                self.metrics.connection_refused();
                Err(e)
            }
        }
    }

    /// Remove a connection from fan-out. Idempotent; a broadcast issued after
    /// this returns will not reach the removed channel.
    pub async fn disconnect(&self, id: ConnectionId) {
        self.registry.unregister(id).await;
    }

    /// Process one inbound client event. Validation is structural only: both
    /// fields must be non-empty after trimming, but the broadcast carries the
    /// original untrimmed values.
    pub async fn handle_event(&self, sender: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::SendMessage { username, text } => {
                self.metrics.message_received();
                if username.trim().is_empty() || text.trim().is_empty() {
                    self.metrics.invalid_payload();
                    debug!(conn_id = %sender, "Dropping sendMessage with empty field");
                    return;
                }
                let message = ChatMessage {
                    username: self.identity.resolve(&username, sender),
                    text,
                    timestamp: chrono::Utc::now().to_rfc3339(),
                };
                self.metrics.message_broadcast();
                self.broadcast(ServerEvent::Message(message), None).await;
            }
            ClientEvent::Typing { username } => {
                if username.trim().is_empty() {
                    self.metrics.invalid_payload();
                    debug!(conn_id = %sender, "Dropping typing event with empty username");
                    return;
                }
                self.metrics.typing_event();
                let username = self.identity.resolve(&username, sender);
                let skip = self.config.typing_excludes_sender.then_some(sender);
                self.broadcast(ServerEvent::Typing { username }, skip).await;
            }
        }
    }

    /// Fan an event out to every registered channel except `skip`. Non-blocking:
    /// a full channel drops this delivery, a closed channel is left for the
    /// session's own cleanup.
    async fn broadcast(&self, event: ServerEvent, skip: Option<ConnectionId>) {
        for (id, tx) in self.registry.senders().await {
            if Some(id) == skip {
                continue;
            }
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.metrics.message_dropped();
                    warn!(conn_id = %id, "Send channel full, dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }
}

/// Per-connection token bucket for sendMessage throttling.
///
/// Refill happens lazily on each check. A rate of 0 disables the guard.
/// Time is a parameter so the refill math is testable without sleeping.
pub struct RateGuard {
    rate_per_sec: f64,
    burst: f64,
    tokens: f64,
    last_refill: Instant,
}

impl RateGuard {
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        Self {
            rate_per_sec,
            burst: burst as f64,
            tokens: burst as f64,
            last_refill: Instant::now(),
        }
    }

    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }

    pub fn allow_at(&mut self, now: Instant) -> bool {
        if self.rate_per_sec <= 0.0 {
            return true;
        }
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.burst);
        self.last_refill = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ClaimedNameIdentity;
    use std::time::Duration;
    use tokio::sync::mpsc::error::TryRecvError;

    fn relay_with(config: RelayConfig) -> ChatRelay {
        ChatRelay::new(
            config,
            Arc::new(ClaimedNameIdentity),
            Arc::new(RelayMetrics::new()),
        )
    }

    fn relay() -> ChatRelay {
        relay_with(RelayConfig::default())
    }

    fn send(username: &str, text: &str) -> ClientEvent {
        ClientEvent::SendMessage {
            username: username.to_string(),
            text: text.to_string(),
        }
    }

    // ── fan-out ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn message_reaches_every_connection_including_sender() {
        let relay = relay();
        let (a, mut rx_a) = relay.connect().await.unwrap();
        let (_b, mut rx_b) = relay.connect().await.unwrap();
        let (_c, mut rx_c) = relay.connect().await.unwrap();

        relay.handle_event(a, send("Ahmed", "ahoy all")).await;

        for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
            match rx.try_recv().unwrap() {
                ServerEvent::Message(msg) => {
                    assert_eq!(msg.username, "Ahmed");
                    assert_eq!(msg.text, "ahoy all");
                    assert!(!msg.timestamp.is_empty());
                }
                other => panic!("Expected message event, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn broadcast_preserves_untrimmed_values() {
        let relay = relay();
        let (a, mut rx_a) = relay.connect().await.unwrap();

        relay.handle_event(a, send("  Ahmed ", " hello ")).await;

        match rx_a.try_recv().unwrap() {
            ServerEvent::Message(msg) => {
                assert_eq!(msg.username, "  Ahmed ");
                assert_eq!(msg.text, " hello ");
            }
            other => panic!("Expected message event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn timestamp_is_server_stamped_rfc3339() {
        let relay = relay();
        let (a, mut rx_a) = relay.connect().await.unwrap();

        relay.handle_event(a, send("Ahmed", "hello")).await;

        match rx_a.try_recv().unwrap() {
            ServerEvent::Message(msg) => {
                chrono::DateTime::parse_from_rfc3339(&msg.timestamp)
                    .expect("timestamp should parse as RFC 3339");
            }
            other => panic!("Expected message event, got {:?}", other),
        }
    }

    // ── malformed payloads ──────────────────────────────────────────────

    #[tokio::test]
    async fn empty_fields_are_dropped_silently() {
        let relay = relay();
        let (a, mut rx_a) = relay.connect().await.unwrap();
        let (_b, mut rx_b) = relay.connect().await.unwrap();

        relay.handle_event(a, send("Ahmed", "")).await;
        relay.handle_event(a, send("Ahmed", "   ")).await;
        relay.handle_event(a, send("", "hello")).await;
        relay.handle_event(a, send("  ", "hello")).await;

        assert_eq!(rx_a.try_recv().unwrap_err(), TryRecvError::Empty);
        assert_eq!(rx_b.try_recv().unwrap_err(), TryRecvError::Empty);
        assert_eq!(
            relay
                .metrics()
                .invalid_payloads
                .load(std::sync::atomic::Ordering::Relaxed),
            4
        );
    }

    #[tokio::test]
    async fn valid_message_after_malformed_goes_through() {
        let relay = relay();
        let (a, mut rx_a) = relay.connect().await.unwrap();

        relay.handle_event(a, send("Ahmed", "   ")).await;
        relay.handle_event(a, send("Ahmed", "real one")).await;

        match rx_a.try_recv().unwrap() {
            ServerEvent::Message(msg) => assert_eq!(msg.text, "real one"),
            other => panic!("Expected message event, got {:?}", other),
        }
        assert_eq!(rx_a.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    // ── typing ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn typing_reaches_everyone_by_default() {
        let relay = relay();
        let (a, mut rx_a) = relay.connect().await.unwrap();
        let (_b, mut rx_b) = relay.connect().await.unwrap();

        relay
            .handle_event(
                a,
                ClientEvent::Typing {
                    username: "Ahmed".to_string(),
                },
            )
            .await;

        for rx in [&mut rx_a, &mut rx_b] {
            match rx.try_recv().unwrap() {
                ServerEvent::Typing { username } => assert_eq!(username, "Ahmed"),
                other => panic!("Expected typing event, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn typing_can_exclude_sender() {
        let relay = relay_with(RelayConfig {
            typing_excludes_sender: true,
            ..RelayConfig::default()
        });
        let (a, mut rx_a) = relay.connect().await.unwrap();
        let (_b, mut rx_b) = relay.connect().await.unwrap();

        relay
            .handle_event(
                a,
                ClientEvent::Typing {
                    username: "Ahmed".to_string(),
                },
            )
            .await;

        assert_eq!(rx_a.try_recv().unwrap_err(), TryRecvError::Empty);
        assert!(matches!(
            rx_b.try_recv().unwrap(),
            ServerEvent::Typing { .. }
        ));
    }

    #[tokio::test]
    async fn typing_with_blank_username_is_dropped() {
        let relay = relay();
        let (a, mut rx_a) = relay.connect().await.unwrap();

        relay
            .handle_event(
                a,
                ClientEvent::Typing {
                    username: "   ".to_string(),
                },
            )
            .await;

        assert_eq!(rx_a.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    // ── lifecycle ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn disconnect_removes_channel_from_fanout() {
        let relay = relay();
        let (a, mut rx_a) = relay.connect().await.unwrap();
        let (b, mut rx_b) = relay.connect().await.unwrap();

        relay.disconnect(b).await;
        relay.handle_event(a, send("Ahmed", "still here?")).await;

        assert!(matches!(
            rx_a.try_recv().unwrap(),
            ServerEvent::Message(_)
        ));
        // The departed channel got nothing and nothing blew up.
        assert!(rx_b.try_recv().is_err());
        assert_eq!(relay.connection_count().await, 1);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let relay = relay();
        let (a, _rx) = relay.connect().await.unwrap();
        relay.disconnect(a).await;
        relay.disconnect(a).await;
        assert_eq!(relay.connection_count().await, 0);
    }

    #[tokio::test]
    async fn connect_refused_at_capacity() {
        let relay = relay_with(RelayConfig {
            max_connections: 1,
            ..RelayConfig::default()
        });
        let (_a, _rx) = relay.connect().await.unwrap();

        assert!(relay.connect().await.is_err());
        assert_eq!(
            relay
                .metrics()
                .connections_refused
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn full_channel_drops_delivery_without_blocking() {
        let relay = relay_with(RelayConfig {
            send_channel_capacity: 1,
            ..RelayConfig::default()
        });
        let (a, mut rx_a) = relay.connect().await.unwrap();
        let (_slow, _rx_slow_kept_unread) = relay.connect().await.unwrap();

        relay.handle_event(a, send("Ahmed", "one")).await;
        relay.handle_event(a, send("Ahmed", "two")).await;

        // The sender drained nothing either, so its second delivery dropped
        // too; both deliveries of "one" made it.
        assert!(matches!(rx_a.try_recv().unwrap(), ServerEvent::Message(_)));
        assert_eq!(
            relay
                .metrics()
                .messages_dropped
                .load(std::sync::atomic::Ordering::Relaxed),
            2
        );
    }

    // ── rate guard ──────────────────────────────────────────────────────

    #[test]
    fn rate_guard_allows_burst_then_throttles() {
        let mut guard = RateGuard::new(1.0, 3);
        let t0 = Instant::now();

        assert!(guard.allow_at(t0));
        assert!(guard.allow_at(t0));
        assert!(guard.allow_at(t0));
        assert!(!guard.allow_at(t0));
    }

    #[test]
    fn rate_guard_refills_over_time() {
        let mut guard = RateGuard::new(2.0, 2);
        let t0 = Instant::now();

        assert!(guard.allow_at(t0));
        assert!(guard.allow_at(t0));
        assert!(!guard.allow_at(t0));

        // 2 tokens/sec: after 500ms one token is back.
        assert!(guard.allow_at(t0 + Duration::from_millis(500)));
        assert!(!guard.allow_at(t0 + Duration::from_millis(500)));
    }

    #[test]
    fn rate_guard_caps_refill_at_burst() {
        let mut guard = RateGuard::new(10.0, 2);
        let t0 = Instant::now();

        // A long idle stretch must not bank more than the burst.
        assert!(guard.allow_at(t0 + Duration::from_secs(60)));
        assert!(guard.allow_at(t0 + Duration::from_secs(60)));
        assert!(!guard.allow_at(t0 + Duration::from_secs(60)));
    }

    #[test]
    fn rate_guard_zero_rate_disables() {
        let mut guard = RateGuard::new(0.0, 0);
        let t0 = Instant::now();
        for _ in 0..100 {
            assert!(guard.allow_at(t0));
        }
    }
}
