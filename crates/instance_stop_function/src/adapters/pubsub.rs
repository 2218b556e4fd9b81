use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// A Pub/Sub message as delivered to the function.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PubSubMessage {
    /// Base64 in JSON; absent when the publisher sent only attributes.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default, alias = "message_id")]
    pub message_id: Option<String>,
    #[serde(default, alias = "publish_time")]
    pub publish_time: Option<DateTime<Utc>>,
}

impl PubSubMessage {
    pub fn decoded_data(&self) -> Result<Vec<u8>, EnvelopeError> {
        match self.data.as_deref() {
            None | Some("") => Ok(Vec::new()),
            Some(encoded) => Ok(STANDARD.decode(encoded.trim())?),
        }
    }
}

/// Push subscription body: `{"message": {...}, "subscription": "..."}`.
/// Only the message is used.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PushEnvelope {
    pub message: PubSubMessage,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed Pub/Sub envelope: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Pub/Sub message data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Accept either a push envelope or a bare `{"data": ...}` message.
pub fn parse_trigger_body(body: &[u8]) -> Result<PubSubMessage, EnvelopeError> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    if value.get("message").is_some() {
        let envelope: PushEnvelope = serde_json::from_value(value)?;
        return Ok(envelope.message);
    }
    Ok(serde_json::from_value(value)?)
}
