use pathstore_store::StoreError;

/// Errors produced by the MQTT bridge.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// Topic is outside `load/#` and `save/#`.
    #[error("unhandled topic: {0}")]
    UnknownTopic(String),

    /// Topic carries a command prefix but no document path.
    #[error("topic {0:?} names no document path")]
    MissingPath(String),

    /// Payload of a `save/` message is not JSON.
    #[error("malformed payload on {topic}: {reason}")]
    MalformedPayload { topic: String, reason: String },

    /// Broker address or option could not be used.
    #[error("invalid mqtt configuration: {0}")]
    Config(String),

    /// Request could not be queued on the client.
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type MqttResult<T> = std::result::Result<T, MqttError>;
