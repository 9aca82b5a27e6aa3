use crate::error::AckCode;
use crate::models::message::ChatMessage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Ok,
    Fail,
}

/// Success/failure wrapper written to a connection.
///
/// Receivers get `ok` with the message as payload; senders get exactly one
/// envelope per inbound message, `ok` with the accepted message or `fail`
/// with the error code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: EnvelopeStatus,
    pub code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<ChatMessage>,
}

impl Envelope {
    pub fn ok(message: ChatMessage) -> Self {
        Self {
            status: EnvelopeStatus::Ok,
            code: AckCode::Ok.as_u16(),
            message: "ok".to_string(),
            payload: Some(message),
        }
    }

    pub fn fail(code: AckCode, message: impl Into<String>) -> Self {
        Self {
            status: EnvelopeStatus::Fail,
            code: code.as_u16(),
            message: message.into(),
            payload: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == EnvelopeStatus::Ok
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
