pub mod conversation_cache;
pub mod history_store;
pub mod relay;
pub mod validator;

pub use conversation_cache::{ConversationCache, RedisConversationCache};
pub use history_store::{HistoryStore, PgHistoryStore};
pub use relay::{RelayPipeline, RelayStage};
