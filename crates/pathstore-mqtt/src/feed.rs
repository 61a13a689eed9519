use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::command::DATA_PREFIX;
use crate::error::MqttResult;

/// A document read or written over MQTT, to be published on `data/<path>`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DataEvent {
    pub path: String,
    pub data: Value,
}

impl DataEvent {
    pub fn new(path: impl Into<String>, data: Value) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    pub fn topic(&self) -> String {
        format!("{DATA_PREFIX}{}", self.path)
    }

    /// The document alone, as compact JSON.
    pub fn payload(&self) -> MqttResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.data)?)
    }
}

pub type DataStream = broadcast::Receiver<DataEvent>;

/// Fan-out of [`DataEvent`]s to every listener.
///
/// There is no correlation between a request and its result: every
/// subscriber sees every event.
#[derive(Clone, Debug)]
pub struct DataFeed {
    sender: broadcast::Sender<DataEvent>,
}

impl DataFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> DataStream {
        self.sender.subscribe()
    }

    /// Send `event` to current subscribers. Returns how many received it.
    pub fn publish(&self, event: DataEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
