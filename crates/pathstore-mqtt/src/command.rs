use serde_json::Value;

use crate::error::{MqttError, MqttResult};

pub const LOAD_FILTER: &str = "load/#";
pub const SAVE_FILTER: &str = "save/#";
pub const DATA_PREFIX: &str = "data/";

/// An instruction carried by an incoming publish.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Load { path: String },
    Save { path: String, data: Value },
}

impl Command {
    /// Read a command from `load/<path>` or `save/<path>`.
    ///
    /// A `save` payload must be JSON; `load` ignores its payload.
    pub fn parse(topic: &str, payload: &[u8]) -> MqttResult<Self> {
        let (verb, path) = topic
            .split_once('/')
            .ok_or_else(|| MqttError::UnknownTopic(topic.to_string()))?;
        if !matches!(verb, "load" | "save") {
            return Err(MqttError::UnknownTopic(topic.to_string()));
        }
        if path.trim().is_empty() {
            return Err(MqttError::MissingPath(topic.to_string()));
        }
        let path = path.to_string();

        if verb == "load" {
            return Ok(Self::Load { path });
        }
        let data = serde_json::from_slice(payload).map_err(|e| MqttError::MalformedPayload {
            topic: topic.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::Save { path, data })
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Load { path } | Self::Save { path, .. } => path,
        }
    }
}
