//! In-memory stand-ins for the relay pipeline's stores and connection layer.
//!
//! Each fake records what it was asked to do so tests can assert on the
//! exact sequence of side effects without Postgres, Redis or a socket.

#![allow(dead_code)]

use async_trait::async_trait;
use im_relay_service::error::{StoreError, StoreResult};
use im_relay_service::models::{
    Envelope, HistoryCursor, HistoryRecord, LastChatEntry, StoredHistoryRecord,
};
use im_relay_service::services::{ConversationCache, HistoryStore, RelayPipeline};
use im_relay_service::websocket::ConnectionHub;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// History store backed by a vector; ids are assigned from 1 in append order
#[derive(Clone, Default)]
pub struct MockHistoryStore {
    records: Arc<Mutex<Vec<StoredHistoryRecord>>>,
    failing: Arc<Mutex<bool>>,
}

impl MockHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent append fail
    pub fn fail_writes(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn records(&self) -> Vec<HistoryRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|stored| stored.record.clone())
            .collect()
    }
}

#[async_trait]
impl HistoryStore for MockHistoryStore {
    async fn append_history(&self, record: &HistoryRecord) -> StoreResult<()> {
        if *self.failing.lock().unwrap() {
            return Err(StoreError::Database("history unavailable".into()));
        }
        let mut records = self.records.lock().unwrap();
        let id = records.len() as i64 + 1;
        records.push(StoredHistoryRecord {
            id,
            record: record.clone(),
        });
        Ok(())
    }

    async fn list_history(
        &self,
        conversation_id: &str,
        before: Option<HistoryCursor>,
        limit: i64,
    ) -> StoreResult<Vec<StoredHistoryRecord>> {
        let mut records: Vec<StoredHistoryRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.record.conversation_id == conversation_id)
            .filter(|r| before.map_or(true, |c| c.precedes(r.record.send_time, r.id)))
            .cloned()
            .collect();
        records.sort_by(|a, b| (b.record.send_time, b.id).cmp(&(a.record.send_time, a.id)));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }
}

/// Last-chat cache keyed by (receiver, conversation). Uses the trait's
/// default read-merge-write `record_incoming`.
#[derive(Clone, Default)]
pub struct MockConversationCache {
    entries: Arc<Mutex<HashMap<(String, String), LastChatEntry>>>,
    failing: Arc<Mutex<bool>>,
}

impl MockConversationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn entry(&self, receiver_id: &str, conversation_id: &str) -> Option<LastChatEntry> {
        self.entries
            .lock()
            .unwrap()
            .get(&(receiver_id.to_string(), conversation_id.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl ConversationCache for MockConversationCache {
    async fn get(
        &self,
        receiver_id: &str,
        conversation_id: &str,
    ) -> StoreResult<Option<LastChatEntry>> {
        Ok(self.entry(receiver_id, conversation_id))
    }

    async fn put(
        &self,
        receiver_id: &str,
        conversation_id: &str,
        entry: &LastChatEntry,
    ) -> StoreResult<()> {
        if *self.failing.lock().unwrap() {
            return Err(StoreError::Database("cache unavailable".into()));
        }
        self.entries.lock().unwrap().insert(
            (receiver_id.to_string(), conversation_id.to_string()),
            entry.clone(),
        );
        Ok(())
    }

    async fn list_entries(&self, receiver_id: &str) -> StoreResult<Vec<(String, LastChatEntry)>> {
        let mut entries: Vec<(String, LastChatEntry)> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|((receiver, _), _)| receiver == receiver_id)
            .map(|((_, conversation), entry)| (conversation.clone(), entry.clone()))
            .collect();
        entries.sort_by(|a, b| b.1.last_message.send_time.cmp(&a.1.last_message.send_time));
        Ok(entries)
    }
}

/// Connection layer that records every envelope pushed per user
#[derive(Clone, Default)]
pub struct MockHub {
    connected: Arc<Mutex<HashSet<String>>>,
    pushed: Arc<Mutex<HashMap<String, Vec<Envelope>>>>,
}

impl MockHub {
    pub fn with_connected(users: &[&str]) -> Self {
        let hub = Self::default();
        for user in users {
            hub.connect(user);
        }
        hub
    }

    pub fn connect(&self, user_id: &str) {
        self.connected.lock().unwrap().insert(user_id.to_string());
    }

    pub fn disconnect(&self, user_id: &str) {
        self.connected.lock().unwrap().remove(user_id);
    }

    /// Envelopes pushed to `user_id`, oldest first
    pub fn pushed_to(&self, user_id: &str) -> Vec<Envelope> {
        self.pushed
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConnectionHub for MockHub {
    async fn is_connected(&self, user_id: &str) -> bool {
        self.connected.lock().unwrap().contains(user_id)
    }

    async fn push(&self, user_id: &str, envelope: &Envelope) -> bool {
        if !self.connected.lock().unwrap().contains(user_id) {
            return false;
        }
        self.pushed
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .push(envelope.clone());
        true
    }
}

pub struct Harness {
    pub history: MockHistoryStore,
    pub cache: MockConversationCache,
    pub hub: MockHub,
    pub relay: RelayPipeline,
}

impl Harness {
    pub fn new(connected: &[&str]) -> Self {
        let history = MockHistoryStore::new();
        let cache = MockConversationCache::new();
        let hub = MockHub::with_connected(connected);
        let relay = RelayPipeline::new(
            Arc::new(history.clone()),
            Arc::new(cache.clone()),
            Arc::new(hub.clone()),
        );
        Self {
            history,
            cache,
            hub,
            relay,
        }
    }
}

pub fn message_json(conversation_id: &str, sender: &str, receiver: &str, body: &str) -> Vec<u8> {
    serde_json::json!({
        "conversationId": conversation_id,
        "senderId": sender,
        "receiverId": receiver,
        "goodsId": "g1",
        "messageType": "text",
        "messageBody": body,
    })
    .to_string()
    .into_bytes()
}
