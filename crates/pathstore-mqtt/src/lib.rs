//! MQTT bridge for pathstore.
//!
//! Listens on `load/#` and `save/#`. A `save/<path>` publish stores its JSON
//! payload; a `load/<path>` publish reads the document. Either way the
//! document is broadcast on `data/<path>` to every listener.

pub mod bridge;
pub mod command;
pub mod config;
pub mod error;
pub mod feed;

pub use bridge::MqttBridge;
pub use command::{Command, DATA_PREFIX, LOAD_FILTER, SAVE_FILTER};
pub use config::MqttConfig;
pub use error::{MqttError, MqttResult};
pub use feed::{DataEvent, DataFeed, DataStream};
