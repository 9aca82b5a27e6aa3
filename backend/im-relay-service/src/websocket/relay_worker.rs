use super::{ConnectionRegistry, SubscriberId};
use crate::services::RelayPipeline;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::task::JoinHandle;

/// Relays one connection's payloads one at a time, in arrival order.
///
/// Runs on its own task so an in-flight message finishes (cache update and
/// acknowledgment included) even after the socket closes. Frames still
/// queued once a newer connection has replaced this one are dropped
/// unprocessed, so their acknowledgments never reach the new connection.
/// The task ends when the returned sender is dropped and the queue drains.
pub fn spawn_relay_worker(
    relay: RelayPipeline,
    registry: ConnectionRegistry,
    user_id: String,
    subscriber_id: SubscriberId,
) -> (UnboundedSender<Vec<u8>>, JoinHandle<()>) {
    let (tx, mut rx) = unbounded_channel::<Vec<u8>>();
    let handle = tokio::spawn(async move {
        let mut dropped = 0usize;
        while let Some(raw) = rx.recv().await {
            if registry.is_superseded(&user_id, subscriber_id).await {
                dropped += 1;
                continue;
            }
            relay.handle_inbound_message(&user_id, &raw).await;
        }
        if dropped > 0 {
            tracing::warn!(
                user_id = %user_id,
                ?subscriber_id,
                dropped,
                "dropped frames queued on a replaced connection"
            );
        }
        tracing::debug!(user_id = %user_id, "relay worker finished");
    });
    (tx, handle)
}
