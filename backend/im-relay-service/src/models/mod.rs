pub mod envelope;
pub mod message;

pub use envelope::{Envelope, EnvelopeStatus};
pub use message::{
    ChatMessage, HistoryCursor, HistoryRecord, LastChatEntry, MessageType, ParticipantPair,
    StoredHistoryRecord, UserId,
};
