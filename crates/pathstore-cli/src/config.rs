use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use pathstore_mqtt::MqttConfig;
use pathstore_server::ServerConfig;
use pathstore_store::StoreConfig;

use crate::cli::ServeArgs;

/// Everything one `pathstore` process is configured with.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub mqtt: MqttConfig,
}

impl AppConfig {
    /// Read `path`, or fall back to defaults if it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Layer `serve` flags and their environment variables over the file.
    pub fn apply_serve_args(&mut self, args: &ServeArgs) -> anyhow::Result<()> {
        if let Some(bind) = args.bind {
            self.server.bind_addr = bind;
        }
        if let Some(root) = &args.export_root {
            self.server.export_root = root.clone();
        }
        if let Some(url) = &args.database_url {
            self.store.database_url = Some(url.clone());
        }
        if let Some(server) = &args.mqtt_server {
            self.mqtt.set_server(server)?;
            self.mqtt.enabled = true;
        }
        if let Some(user) = &args.mqtt_user {
            self.mqtt.username = Some(user.clone());
        }
        if let Some(pass) = &args.mqtt_pass {
            self.mqtt.password = Some(pass.clone());
        }
        if args.no_mqtt {
            self.mqtt.enabled = false;
        }
        Ok(())
    }
}
