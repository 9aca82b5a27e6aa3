use crate::metrics;
use crate::models::envelope::Envelope;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

mod relay_worker;

pub use relay_worker::spawn_relay_worker;

/// Unique identifier for a WebSocket subscriber
///
/// Each WebSocket connection gets a unique subscriber ID when it registers.
/// This allows for precise cleanup when connections close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// What the relay pipeline needs from the live connection layer.
#[async_trait]
pub trait ConnectionHub: Send + Sync {
    async fn is_connected(&self, user_id: &str) -> bool;

    /// Write an envelope to the user's connection. Returns `false` if the
    /// user has no live connection.
    async fn push(&self, user_id: &str, envelope: &Envelope) -> bool;
}

struct Subscriber {
    id: SubscriberId,
    sender: UnboundedSender<String>,
}

/// Connection registry for WebSocket sessions
///
/// Holds at most one live connection per user. A newer connection for the same
/// user replaces the older one; the older session keeps running until its
/// socket closes but no longer receives pushes.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    // user_id -> subscriber
    inner: Arc<RwLock<HashMap<String, Subscriber>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a connection to `user_id`.
    ///
    /// Returns the subscriber id (needed for cleanup) and the channel on which
    /// outbound frames for this connection arrive.
    pub async fn register(&self, user_id: &str) -> (SubscriberId, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let subscriber_id = SubscriberId::new();

        let mut guard = self.inner.write().await;
        let replaced = guard
            .insert(
                user_id.to_string(),
                Subscriber {
                    id: subscriber_id,
                    sender: tx,
                },
            )
            .is_some();
        metrics::set_connections(guard.len());

        tracing::debug!(
            user_id = %user_id,
            ?subscriber_id,
            replaced,
            total = guard.len(),
            "registered connection"
        );

        (subscriber_id, rx)
    }

    /// Remove the user's connection if it is still `subscriber_id`.
    ///
    /// Must be called when a WebSocket connection closes. A stale session
    /// closing never evicts the connection that replaced it.
    pub async fn unregister(&self, user_id: &str, subscriber_id: SubscriberId) {
        let mut guard = self.inner.write().await;

        if guard.get(user_id).map(|s| s.id) == Some(subscriber_id) {
            guard.remove(user_id);
            metrics::set_connections(guard.len());
            tracing::debug!(user_id = %user_id, ?subscriber_id, "removed connection");
        }
    }

    /// True when a newer connection has taken over `user_id` from `subscriber_id`.
    pub async fn is_superseded(&self, user_id: &str, subscriber_id: SubscriberId) -> bool {
        self.inner
            .read()
            .await
            .get(user_id)
            .map_or(false, |s| s.id != subscriber_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Send a raw text frame. Dead senders are removed.
    async fn send_text(&self, user_id: &str, text: String) -> bool {
        {
            let guard = self.inner.read().await;
            match guard.get(user_id) {
                None => return false,
                Some(subscriber) => {
                    if subscriber.sender.send(text).is_ok() {
                        return true;
                    }
                }
            }
        }

        // Receiver dropped without unregistering.
        let mut guard = self.inner.write().await;
        if guard
            .get(user_id)
            .map(|s| s.sender.is_closed())
            .unwrap_or(false)
        {
            guard.remove(user_id);
            metrics::set_connections(guard.len());
            tracing::debug!(user_id = %user_id, "cleaned up dead connection");
        }
        false
    }
}

#[async_trait]
impl ConnectionHub for ConnectionRegistry {
    async fn is_connected(&self, user_id: &str) -> bool {
        let guard = self.inner.read().await;
        guard
            .get(user_id)
            .map(|s| !s.sender.is_closed())
            .unwrap_or(false)
    }

    async fn push(&self, user_id: &str, envelope: &Envelope) -> bool {
        match envelope.to_json() {
            Ok(text) => self.send_text(user_id, text).await,
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "failed to serialize envelope");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AckCode;

    #[tokio::test]
    async fn test_push_reaches_registered_user() {
        let registry = ConnectionRegistry::new();
        let (_id, mut rx) = registry.register("bob").await;

        assert!(registry.is_connected("bob").await);
        let envelope = Envelope::fail(AckCode::MalformedPayload, "bad");
        assert!(registry.push("bob", &envelope).await);

        let frame = rx.recv().await.unwrap();
        let decoded: Envelope = serde_json::from_str(&frame).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[tokio::test]
    async fn test_push_to_absent_user_is_noop() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.is_connected("ghost").await);
        let envelope = Envelope::fail(AckCode::MalformedPayload, "bad");
        assert!(!registry.push("ghost", &envelope).await);
    }

    #[tokio::test]
    async fn test_newer_connection_replaces_older() {
        let registry = ConnectionRegistry::new();
        let (old_id, mut old_rx) = registry.register("bob").await;
        let (new_id, mut new_rx) = registry.register("bob").await;
        assert_eq!(registry.connection_count().await, 1);

        let envelope = Envelope::fail(AckCode::IncompleteMessage, "missing");
        assert!(registry.push("bob", &envelope).await);
        assert!(new_rx.recv().await.is_some());
        // old sender was dropped on replacement
        assert!(old_rx.recv().await.is_none());

        assert!(registry.is_superseded("bob", old_id).await);
        assert!(!registry.is_superseded("bob", new_id).await);

        // stale session closing keeps the newer connection
        registry.unregister("bob", old_id).await;
        assert!(registry.is_connected("bob").await);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_cleaned_up() {
        let registry = ConnectionRegistry::new();
        let (_id, rx) = registry.register("bob").await;
        drop(rx);

        assert!(!registry.is_connected("bob").await);
        let envelope = Envelope::fail(AckCode::IncompleteMessage, "missing");
        assert!(!registry.push("bob", &envelope).await);
        assert_eq!(registry.connection_count().await, 0);
    }
}
