//! Decoding and completeness checks for raw inbound chat payloads.

use crate::error::RelayError;
use crate::models::message::{ChatMessage, MessageType};
use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use serde::Deserialize;

/// Identifier-like value that clients send either as a string or a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireScalar {
    Text(String),
    Number(serde_json::Number),
}

impl WireScalar {
    /// Zero-valued numbers count as empty.
    fn into_opaque(self) -> String {
        match self {
            WireScalar::Text(s) => s,
            WireScalar::Number(n) => {
                if n.as_f64() == Some(0.0) {
                    String::new()
                } else {
                    n.to_string()
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTime {
    Millis(i64),
    Rfc3339(DateTime<Utc>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChatMessage {
    #[serde(default, alias = "chatId")]
    conversation_id: Option<WireScalar>,
    #[serde(default)]
    sender_id: Option<WireScalar>,
    #[serde(default)]
    receiver_id: Option<WireScalar>,
    #[serde(default, alias = "subjectGoodsId")]
    goods_id: Option<WireScalar>,
    #[serde(default)]
    message_type: Option<WireScalar>,
    #[serde(default)]
    message_body: Option<WireScalar>,
    #[serde(default)]
    send_time: Option<WireTime>,
}

fn required(value: Option<WireScalar>, field: &'static str) -> Result<String, RelayError> {
    match value.map(WireScalar::into_opaque) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(RelayError::Incomplete(field)),
    }
}

/// Parse a raw payload into a [`ChatMessage`].
///
/// A missing `sendTime` is stamped with the current time. `sendTime` is
/// truncated to whole milliseconds, the precision it is serialized with;
/// nothing else is normalized.
pub fn parse(raw: &[u8]) -> Result<ChatMessage, RelayError> {
    // Only a JSON object has the expected shape.
    let object: serde_json::Map<String, serde_json::Value> =
        serde_json::from_slice(raw).map_err(|e| RelayError::Decode(e.to_string()))?;
    let wire = RawChatMessage::deserialize(serde_json::Value::Object(object))
        .map_err(|e| RelayError::Decode(e.to_string()))?;

    let conversation_id = required(wire.conversation_id, "conversationId")?;
    let sender_id = required(wire.sender_id, "senderId")?;
    let receiver_id = required(wire.receiver_id, "receiverId")?;
    let subject_goods_id = required(wire.goods_id, "goodsId")?;
    let message_type = required(wire.message_type, "messageType")?;
    let message_body = required(wire.message_body, "messageBody")?;

    let message_type = MessageType::parse(&message_type)
        .ok_or_else(|| RelayError::Decode(format!("unknown message type `{message_type}`")))?;

    let send_time = match wire.send_time {
        None => Utc::now(),
        Some(WireTime::Rfc3339(t)) => t,
        Some(WireTime::Millis(ms)) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| RelayError::Decode(format!("sendTime out of range: {ms}")))?,
    };
    let send_time = send_time.trunc_subsecs(3);

    Ok(ChatMessage {
        conversation_id,
        sender_id,
        receiver_id,
        subject_goods_id,
        message_type,
        message_body,
        send_time,
    })
}
