use crate::{
    config::Config,
    services::{ConversationCache, HistoryStore, RelayPipeline},
    websocket::ConnectionRegistry,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: ConnectionRegistry,
    pub relay: RelayPipeline,
    /// Read side of the history store, for later retrieval
    pub history: Arc<dyn HistoryStore>,
    /// Read side of the last-chat cache, for inbox previews
    pub cache: Arc<dyn ConversationCache>,
}

impl AppState {
    /// Wire the relay pipeline over the given stores and the in-process registry.
    pub fn new(
        config: Arc<Config>,
        history: Arc<dyn HistoryStore>,
        cache: Arc<dyn ConversationCache>,
        registry: ConnectionRegistry,
    ) -> Self {
        let relay = RelayPipeline::new(history.clone(), cache.clone(), Arc::new(registry.clone()));
        Self {
            config,
            registry,
            relay,
            history,
            cache,
        }
    }
}
