use serde::Deserialize;

use crate::error::Result;

/// An unsolicited host message: `[type, message]` on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEnvelope {
    pub kind: String,
    pub message: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireEnvelope {
    Pair(String, String),
    Object {
        #[serde(rename = "messageType")]
        message_type: String,
        message: String,
    },
}

impl PushEnvelope {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Parse either `["type","message"]` or
    /// `{"messageType":"type","message":"message"}`.
    pub fn parse(raw: &str) -> Result<Self> {
        let envelope = match serde_json::from_str(raw)? {
            WireEnvelope::Pair(kind, message) => Self { kind, message },
            WireEnvelope::Object {
                message_type,
                message,
            } => Self {
                kind: message_type,
                message,
            },
        };
        Ok(envelope)
    }

    /// Serialize in the array form.
    pub fn to_json(&self) -> String {
        serde_json::json!([self.kind, self.message]).to_string()
    }
}
