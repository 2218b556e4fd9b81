use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Label selector carried by a stop trigger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StopRequestPayload {
    #[serde(rename = "labelKey")]
    pub label_key: String,
    #[serde(rename = "labelValue")]
    pub label_value: String,
}

/// The trigger payload was not a JSON object of the expected shape.
#[derive(Debug, Error)]
#[error("invalid stop request payload: {source}")]
pub struct DecodeError {
    #[from]
    source: serde_json::Error,
}

/// Parse the raw message body into a label selector.
///
/// Empty label keys or values are accepted as-is; the provider decides what
/// an empty selector matches.
pub fn decode_payload(bytes: &[u8]) -> Result<StopRequestPayload, DecodeError> {
    Ok(serde_json::from_slice(bytes)?)
}
