//! # Relay Pipeline
//!
//! Handles one inbound chat message from a connected sender:
//!
//! ```text
//! RECEIVED -> VALIDATED -> AUTHORIZED -> PERSISTED -> CACHE_UPDATED -> DELIVERED | SKIPPED
//!      \__________\____________\____________\______________> ABORTED(reason)
//! ```
//!
//! The history append must succeed before the cache entry is touched, and the
//! cache entry must be updated before the receiver sees the message. The
//! sender gets exactly one acknowledgment, once a terminal state is reached.

use crate::error::{PersistStage, RelayError};
use crate::metrics;
use crate::models::envelope::Envelope;
use crate::models::message::{ChatMessage, HistoryRecord};
use crate::services::conversation_cache::ConversationCache;
use crate::services::history_store::HistoryStore;
use crate::services::validator;
use crate::websocket::ConnectionHub;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStage {
    Received,
    Validated,
    Authorized,
    Persisted,
    CacheUpdated,
    Delivered,
    Skipped,
    Aborted,
}

impl fmt::Display for RelayStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelayStage::Received => "received",
            RelayStage::Validated => "validated",
            RelayStage::Authorized => "authorized",
            RelayStage::Persisted => "persisted",
            RelayStage::CacheUpdated => "cache_updated",
            RelayStage::Delivered => "delivered",
            RelayStage::Skipped => "skipped",
            RelayStage::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
pub struct RelayPipeline {
    history: Arc<dyn HistoryStore>,
    cache: Arc<dyn ConversationCache>,
    hub: Arc<dyn ConnectionHub>,
}

impl RelayPipeline {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        cache: Arc<dyn ConversationCache>,
        hub: Arc<dyn ConnectionHub>,
    ) -> Self {
        Self {
            history,
            cache,
            hub,
        }
    }

    /// Process one raw payload received on the connection bound to `caller_id`.
    ///
    /// The result is never returned to the caller of this function; it is
    /// pushed to `caller_id`'s connection as an [`Envelope`]. Callers that may
    /// be cancelled should run this on its own task so a persisted message is
    /// always followed by the cache update and acknowledgment.
    pub async fn handle_inbound_message(&self, caller_id: &str, raw: &[u8]) -> RelayStage {
        tracing::trace!(
            stage = %RelayStage::Received,
            caller_id = %caller_id,
            bytes = raw.len(),
            "inbound payload"
        );
        let (terminal, ack) = match self.relay(caller_id, raw).await {
            Ok((message, stage)) => {
                metrics::record_outcome("ok");
                (stage, Envelope::ok(message))
            }
            Err(err) => {
                metrics::record_outcome(err.outcome());
                if let RelayError::Persistence { stage, source } = &err {
                    metrics::record_persist_failure(stage.as_str());
                    tracing::error!(
                        caller_id = %caller_id,
                        stage = stage.as_str(),
                        error = %source,
                        "message aborted after validation"
                    );
                } else {
                    tracing::info!(caller_id = %caller_id, error = %err, "message rejected");
                }
                (RelayStage::Aborted, Envelope::fail(err.code(), err.to_string()))
            }
        };

        if !self.hub.push(caller_id, &ack).await {
            tracing::debug!(caller_id = %caller_id, "sender gone before acknowledgment");
        }
        terminal
    }

    async fn relay(
        &self,
        caller_id: &str,
        raw: &[u8],
    ) -> Result<(ChatMessage, RelayStage), RelayError> {
        let message = validator::parse(raw)?;
        tracing::debug!(stage = %RelayStage::Validated, sender_id = %message.sender_id, "stage");

        if message.sender_id != caller_id {
            return Err(RelayError::IdentityMismatch {
                claimed: message.sender_id,
                bound: caller_id.to_string(),
            });
        }
        tracing::debug!(stage = %RelayStage::Authorized, sender_id = %message.sender_id, "stage");

        let record = HistoryRecord::from_message(&message);
        self.history
            .append_history(&record)
            .await
            .map_err(|source| RelayError::Persistence {
                stage: PersistStage::History,
                source,
            })?;
        tracing::debug!(
            stage = %RelayStage::Persisted,
            conversation_id = %record.conversation_id,
            first_to_second = record.first_to_second,
            "stage"
        );

        let entry = self
            .cache
            .record_incoming(&message)
            .await
            .map_err(|source| RelayError::Persistence {
                stage: PersistStage::Cache,
                source,
            })?;

        tracing::debug!(
            stage = %RelayStage::CacheUpdated,
            conversation_id = %message.conversation_id,
            receiver_id = %message.receiver_id,
            unread_count = entry.unread_count,
            "stage"
        );

        let stage = self.forward(&message).await;
        tracing::info!(
            sender_id = %message.sender_id,
            receiver_id = %message.receiver_id,
            conversation_id = %message.conversation_id,
            stage = %stage,
            "message relayed"
        );
        Ok((message, stage))
    }

    async fn forward(&self, message: &ChatMessage) -> RelayStage {
        let delivered = self.hub.is_connected(&message.receiver_id).await
            && self
                .hub
                .push(&message.receiver_id, &Envelope::ok(message.clone()))
                .await;
        metrics::record_forward(delivered);

        if delivered {
            RelayStage::Delivered
        } else {
            RelayStage::Skipped
        }
    }
}
