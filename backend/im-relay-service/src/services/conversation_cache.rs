//! Per-receiver "last chat" cache backing inbox previews and unread counts.
//!
//! Layout in Redis: one hash per receiver, `{prefix}:{receiver_id}`, whose
//! fields are conversation ids and whose values are JSON [`LastChatEntry`]s.

use crate::error::{StoreError, StoreResult};
use crate::models::message::{ChatMessage, LastChatEntry};
use crate::redis_client::RedisClient;
use async_trait::async_trait;
use redis::{AsyncCommands, Script};
use std::collections::HashMap;

#[async_trait]
pub trait ConversationCache: Send + Sync {
    async fn get(&self, receiver_id: &str, conversation_id: &str)
        -> StoreResult<Option<LastChatEntry>>;

    async fn put(
        &self,
        receiver_id: &str,
        conversation_id: &str,
        entry: &LastChatEntry,
    ) -> StoreResult<()>;

    /// All entries for a receiver as `(conversation_id, entry)` pairs.
    async fn list_entries(&self, receiver_id: &str) -> StoreResult<Vec<(String, LastChatEntry)>>;

    /// Fold `message` into the receiver's entry for its conversation.
    ///
    /// The default is a plain read-merge-write; stores with server-side
    /// atomic operations should override it.
    async fn record_incoming(&self, message: &ChatMessage) -> StoreResult<LastChatEntry> {
        let existing = self
            .get(&message.receiver_id, &message.conversation_id)
            .await?;
        let entry = LastChatEntry::merge(existing, message.clone());
        self.put(&message.receiver_id, &message.conversation_id, &entry)
            .await?;
        Ok(entry)
    }
}

// KEYS[1] = receiver hash, ARGV[1] = conversation id, ARGV[2] = message JSON.
// Returns the new unread count.
const RECORD_INCOMING_LUA: &str = r#"
local current = redis.call('HGET', KEYS[1], ARGV[1])
local unread = 1
if current then
    local decoded = cjson.decode(current)
    unread = (tonumber(decoded['unreadCount']) or 0) + 1
end
redis.call('HSET', KEYS[1], ARGV[1], '{"unreadCount":' .. string.format('%d', unread) .. ',"lastMessage":' .. ARGV[2] .. '}')
return unread
"#;

pub struct RedisConversationCache {
    redis: RedisClient,
    key_prefix: String,
    record_script: Script,
}

impl RedisConversationCache {
    pub fn new(redis: RedisClient, key_prefix: impl Into<String>) -> Self {
        Self {
            redis,
            key_prefix: key_prefix.into(),
            record_script: Script::new(RECORD_INCOMING_LUA),
        }
    }

    fn receiver_key(&self, receiver_id: &str) -> String {
        format!("{}:{}", self.key_prefix, receiver_id)
    }
}

#[async_trait]
impl ConversationCache for RedisConversationCache {
    async fn get(
        &self,
        receiver_id: &str,
        conversation_id: &str,
    ) -> StoreResult<Option<LastChatEntry>> {
        let mut conn = self.redis.connection().await;
        let raw: Option<String> = conn
            .hget(self.receiver_key(receiver_id), conversation_id)
            .await?;

        raw.map(|data| serde_json::from_str(&data).map_err(StoreError::from))
            .transpose()
    }

    async fn put(
        &self,
        receiver_id: &str,
        conversation_id: &str,
        entry: &LastChatEntry,
    ) -> StoreResult<()> {
        let payload = serde_json::to_string(entry)?;
        let mut conn = self.redis.connection().await;
        conn.hset::<_, _, _, ()>(self.receiver_key(receiver_id), conversation_id, payload)
            .await?;
        Ok(())
    }

    async fn list_entries(&self, receiver_id: &str) -> StoreResult<Vec<(String, LastChatEntry)>> {
        let mut conn = self.redis.connection().await;
        let raw: HashMap<String, String> = conn.hgetall(self.receiver_key(receiver_id)).await?;

        let mut entries = Vec::with_capacity(raw.len());
        for (conversation_id, data) in raw {
            match serde_json::from_str::<LastChatEntry>(&data) {
                Ok(entry) => entries.push((conversation_id, entry)),
                Err(e) => {
                    tracing::warn!(
                        receiver_id = %receiver_id,
                        conversation_id = %conversation_id,
                        error = %e,
                        "skipping undecodable last chat entry"
                    );
                }
            }
        }
        entries.sort_by(|a, b| b.1.last_message.send_time.cmp(&a.1.last_message.send_time));
        Ok(entries)
    }

    async fn record_incoming(&self, message: &ChatMessage) -> StoreResult<LastChatEntry> {
        let payload = serde_json::to_string(message)?;
        let mut conn = self.redis.connection().await;

        let unread_count: u64 = self
            .record_script
            .key(self.receiver_key(&message.receiver_id))
            .arg(&message.conversation_id)
            .arg(payload)
            .invoke_async(&mut conn)
            .await?;

        Ok(LastChatEntry {
            unread_count,
            last_message: message.clone(),
        })
    }
}
