use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Opaque user identity as bound to a connection.
pub type UserId = String;

/// Kind of chat message. The body is interpreted by clients according to this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Image,
    Goods,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Goods => "goods",
        }
    }

    /// Accepts either the name (`"text"`) or the legacy numeric code (`"1"`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" | "1" => Some(MessageType::Text),
            "image" | "2" => Some(MessageType::Image),
            "goods" | "3" => Some(MessageType::Goods),
            _ => None,
        }
    }
}

/// A validated chat message flowing through the relay pipeline.
///
/// Also the `lastMessage` stored in the conversation cache and the payload
/// delivered to the receiver, so the serialized shape is the wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub conversation_id: String,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    #[serde(rename = "goodsId")]
    pub subject_goods_id: String,
    pub message_type: MessageType,
    pub message_body: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub send_time: DateTime<Utc>,
}

/// The two participants of a 1:1 conversation, smaller identity first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParticipantPair {
    pub first: UserId,
    pub second: UserId,
}

impl ParticipantPair {
    /// Order-independent: `canonical(a, b) == canonical(b, a)`.
    pub fn canonical(a: &str, b: &str) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self {
            first: first.to_string(),
            second: second.to_string(),
        }
    }

    /// True when a message from `sender_id` flows from the first participant
    /// toward the second.
    pub fn first_to_second(&self, sender_id: &str) -> bool {
        self.first == sender_id
    }
}

/// Append-only history row. Field mapping from [`ChatMessage`] is explicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub conversation_id: String,
    pub participant_one: UserId,
    pub participant_two: UserId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub goods_id: String,
    pub message_type: MessageType,
    pub message_body: String,
    pub first_to_second: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub send_time: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn from_message(message: &ChatMessage) -> Self {
        let pair = ParticipantPair::canonical(&message.sender_id, &message.receiver_id);
        let first_to_second = pair.first_to_second(&message.sender_id);

        Self {
            conversation_id: message.conversation_id.clone(),
            participant_one: pair.first,
            participant_two: pair.second,
            sender_id: message.sender_id.clone(),
            receiver_id: message.receiver_id.clone(),
            goods_id: message.subject_goods_id.clone(),
            message_type: message.message_type,
            message_body: message.message_body.clone(),
            first_to_second,
            send_time: message.send_time,
        }
    }

    pub fn participants(&self) -> ParticipantPair {
        ParticipantPair {
            first: self.participant_one.clone(),
            second: self.participant_two.clone(),
        }
    }
}

/// A history row as read back from the store, with its store-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredHistoryRecord {
    pub id: i64,
    #[serde(flatten)]
    pub record: HistoryRecord,
}

/// Keyset position in a conversation's history.
///
/// Pages are ordered by `(send_time, id)` descending; a cursor selects rows
/// strictly below it in that order, so rows sharing a timestamp are never
/// skipped. Encoded for clients as `{send_time_millis}:{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryCursor {
    pub send_time: DateTime<Utc>,
    pub id: i64,
}

impl HistoryCursor {
    /// Everything sent strictly before `send_time`. Store ids start at 1.
    pub fn before_time(send_time: DateTime<Utc>) -> Self {
        Self { send_time, id: 0 }
    }

    /// Position just past `stored`, for fetching the next (older) page.
    pub fn after(stored: &StoredHistoryRecord) -> Self {
        Self {
            send_time: stored.record.send_time,
            id: stored.id,
        }
    }

    /// True when a row at `(send_time, id)` belongs after this cursor.
    pub fn precedes(&self, send_time: DateTime<Utc>, id: i64) -> bool {
        (send_time, id) < (self.send_time, self.id)
    }

    pub fn encode(&self) -> String {
        format!("{}:{}", self.send_time.timestamp_millis(), self.id)
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let (millis, id) = raw.split_once(':')?;
        let send_time = Utc.timestamp_millis_opt(millis.parse().ok()?).single()?;
        Some(Self {
            send_time,
            id: id.parse().ok()?,
        })
    }
}

/// Inbox preview for one receiver in one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastChatEntry {
    pub unread_count: u64,
    pub last_message: ChatMessage,
}

impl LastChatEntry {
    /// Fold an incoming message into the previous entry, if any.
    pub fn merge(existing: Option<LastChatEntry>, incoming: ChatMessage) -> LastChatEntry {
        let unread_count = existing.map_or(0, |entry| entry.unread_count) + 1;
        LastChatEntry {
            unread_count,
            last_message: incoming,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: &str, receiver: &str, body: &str) -> ChatMessage {
        ChatMessage {
            conversation_id: "c1".to_string(),
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
            subject_goods_id: "g1".to_string(),
            message_type: MessageType::Text,
            message_body: body.to_string(),
            send_time: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        }
    }

    #[test]
    fn test_canonical_pair_is_symmetric() {
        let ab = ParticipantPair::canonical("alice", "bob");
        let ba = ParticipantPair::canonical("bob", "alice");
        assert_eq!(ab, ba);
        assert_eq!(ab.first, "alice");
        assert_eq!(ab.second, "bob");
    }

    #[test]
    fn test_direction_flips_when_roles_swap() {
        let pair = ParticipantPair::canonical("alice", "bob");
        assert!(pair.first_to_second("alice"));
        assert!(!pair.first_to_second("bob"));

        let forward = HistoryRecord::from_message(&message("alice", "bob", "hi"));
        let backward = HistoryRecord::from_message(&message("bob", "alice", "hey"));
        assert!(forward.first_to_second);
        assert!(!backward.first_to_second);
        assert_eq!(forward.participants(), backward.participants());
    }

    #[test]
    fn test_history_record_copies_message_fields() {
        let msg = message("zed", "amy", "hello");
        let record = HistoryRecord::from_message(&msg);

        assert_eq!(record.conversation_id, msg.conversation_id);
        assert_eq!(record.sender_id, "zed");
        assert_eq!(record.receiver_id, "amy");
        assert_eq!(record.participant_one, "amy");
        assert_eq!(record.participant_two, "zed");
        assert_eq!(record.goods_id, msg.subject_goods_id);
        assert_eq!(record.message_type, msg.message_type);
        assert_eq!(record.message_body, msg.message_body);
        assert_eq!(record.send_time, msg.send_time);
        assert!(!record.first_to_second);
    }

    #[test]
    fn test_merge_creates_entry_when_absent() {
        let msg = message("alice", "bob", "hi");
        let entry = LastChatEntry::merge(None, msg.clone());
        assert_eq!(entry.unread_count, 1);
        assert_eq!(entry.last_message, msg);
    }

    #[test]
    fn test_merge_increments_and_replaces() {
        let first = LastChatEntry::merge(None, message("alice", "bob", "one"));
        let latest = message("alice", "bob", "two");
        let entry = LastChatEntry::merge(Some(first), latest.clone());
        assert_eq!(entry.unread_count, 2);
        assert_eq!(entry.last_message, latest);
    }

    #[test]
    fn test_message_type_accepts_names_and_codes() {
        assert_eq!(MessageType::parse("text"), Some(MessageType::Text));
        assert_eq!(MessageType::parse("2"), Some(MessageType::Image));
        assert_eq!(MessageType::parse("goods"), Some(MessageType::Goods));
        assert_eq!(MessageType::parse("video"), None);
    }

    #[test]
    fn test_chat_message_wire_shape() {
        let json = serde_json::to_value(message("alice", "bob", "hi")).unwrap();
        assert_eq!(json["conversationId"], "c1");
        assert_eq!(json["goodsId"], "g1");
        assert_eq!(json["messageType"], "text");
        assert_eq!(json["sendTime"], 1_700_000_000_000i64);
    }

    #[test]
    fn test_history_cursor_orders_ties_by_id() {
        let at = Utc.timestamp_millis_opt(5_000).unwrap();
        let cursor = HistoryCursor { send_time: at, id: 7 };

        assert!(cursor.precedes(at, 6));
        assert!(!cursor.precedes(at, 7));
        assert!(!cursor.precedes(at, 8));
        assert!(cursor.precedes(Utc.timestamp_millis_opt(4_999).unwrap(), 100));

        assert_eq!(cursor.encode(), "5000:7");
        assert_eq!(HistoryCursor::decode("5000:7"), Some(cursor));
        assert_eq!(HistoryCursor::decode("5000"), None);
        assert_eq!(HistoryCursor::decode("x:7"), None);

        // a bare timestamp excludes every row at that instant
        assert!(!HistoryCursor::before_time(at).precedes(at, 1));
    }
}
