//! Control channel messages.

use serde::{Deserialize, Serialize};
use shelter_core::Error;

/// Inbound control message, e.g. `{"type":"SKIP_WAITING"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate the waiting version now.
    SkipWaiting,
    /// Ask for the running version string.
    GetVersion,
}

impl ControlMessage {
    pub fn parse(value: serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(value).map_err(|e| Error::InvalidInput(format!("control message: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlReply {
    Version { version: String },
    Ack { status: String },
}

impl ControlReply {
    pub fn ok() -> Self {
        ControlReply::Ack { status: "ok".into() }
    }
}
