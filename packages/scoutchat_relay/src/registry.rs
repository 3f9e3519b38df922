//! Connection registry
//!
//! The single piece of server-side connection state: a map from connection id
//! to the mpsc sender feeding that connection's WebSocket. Sessions register
//! on upgrade and unregister on disconnect; fan-out snapshots the map.

use std::collections::HashMap;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::error::RelayError;
use scoutchat_proto::ServerEvent;

/// Server-assigned identifier for one WebSocket connection.
pub type ConnectionId = Uuid;

pub struct ConnectionRegistry {
    channels: RwLock<HashMap<ConnectionId, mpsc::Sender<ServerEvent>>>,
    max_connections: usize,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            max_connections,
        }
    }

    /// Register a connection's send channel. Fails without side effects when
    /// the registry is at capacity.
    pub async fn register(
        &self,
        sender: mpsc::Sender<ServerEvent>,
    ) -> Result<ConnectionId, RelayError> {
        let mut channels = self.channels.write().await;
        if channels.len() >= self.max_connections {
            return Err(RelayError::AtCapacity {
                limit: self.max_connections,
            });
        }
        let id = Uuid::new_v4();
        channels.insert(id, sender);
        Ok(id)
    }

    /// Remove a connection. Idempotent: removing an absent id is a no-op.
    pub async fn unregister(&self, id: ConnectionId) {
        self.channels.write().await.remove(&id);
    }

    /// Snapshot of all live channels for fan-out.
    pub async fn senders(&self) -> Vec<(ConnectionId, mpsc::Sender<ServerEvent>)> {
        self.channels
            .read()
            .await
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect()
    }

    /// Current live connection count.
    pub async fn len(&self) -> usize {
        self.channels.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> mpsc::Sender<ServerEvent> {
        let (tx, _rx) = mpsc::channel(8);
        tx
    }

    #[tokio::test]
    async fn register_assigns_distinct_ids() {
        let registry = ConnectionRegistry::new(16);
        let a = registry.register(channel()).await.unwrap();
        let b = registry.register(channel()).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn register_refuses_at_capacity() {
        let registry = ConnectionRegistry::new(1);
        registry.register(channel()).await.unwrap();

        let err = registry.register(channel()).await.unwrap_err();
        match err {
            RelayError::AtCapacity { limit } => assert_eq!(limit, 1),
        }
        // The failed register left no trace.
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn unregister_frees_a_slot() {
        let registry = ConnectionRegistry::new(1);
        let id = registry.register(channel()).await.unwrap();
        registry.unregister(id).await;
        assert_eq!(registry.len().await, 0);

        registry.register(channel()).await.unwrap();
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let registry = ConnectionRegistry::new(16);
        let id = registry.register(channel()).await.unwrap();
        registry.unregister(id).await;
        registry.unregister(id).await;
        registry.unregister(Uuid::new_v4()).await;
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn senders_snapshot_excludes_unregistered() {
        let registry = ConnectionRegistry::new(16);
        let a = registry.register(channel()).await.unwrap();
        let b = registry.register(channel()).await.unwrap();
        registry.unregister(a).await;

        let senders = registry.senders().await;
        assert_eq!(senders.len(), 1);
        assert_eq!(senders[0].0, b);
    }
}
