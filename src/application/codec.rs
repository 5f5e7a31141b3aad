//! Renderer → host message codec.
//!
//! The schema is closed and versionless: a `type` tag plus a `payload`
//! object. Anything else is a [`DecodeError`], which callers drop silently.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const LINK_MESSAGE: &str = "LINK_MESSAGE";
pub const RESIZE_MESSAGE: &str = "RESIZE_MESSAGE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Message {
    #[serde(rename = "LINK_MESSAGE")]
    Link(LinkPayload),
    #[serde(rename = "RESIZE_MESSAGE")]
    Resize(ResizePayload),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPayload {
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResizePayload {
    pub height: f64,
}

impl Message {
    pub fn link(href: impl Into<String>) -> Self {
        Message::Link(LinkPayload { href: href.into() })
    }

    pub fn resize(height: f64) -> Self {
        Message::Resize(ResizePayload { height })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::Link(_) => LINK_MESSAGE,
            Message::Resize(_) => RESIZE_MESSAGE,
        }
    }

    /// Serialise to the JSON posted by the injected scripts.
    pub fn to_wire(&self) -> String {
        // Both variants are plain string/number payloads.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("message is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("message is not a JSON object")]
    NotAnObject,
    #[error("message does not match any known schema: {0}")]
    Schema(#[source] serde_json::Error),
    #[error("resize height {height} is not a non-negative finite number")]
    InvalidHeight { height: f64 },
}

/// Parse and validate a raw renderer message.
pub fn decode(raw: &str) -> Result<Message, DecodeError> {
    let value: Value = serde_json::from_str(raw).map_err(DecodeError::Json)?;
    if !value.is_object() {
        return Err(DecodeError::NotAnObject);
    }

    let message: Message = serde_json::from_value(value).map_err(DecodeError::Schema)?;
    if let Message::Resize(ResizePayload { height }) = &message
        && (!height.is_finite() || *height < 0.0)
    {
        return Err(DecodeError::InvalidHeight { height: *height });
    }

    Ok(message)
}
