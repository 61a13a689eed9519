use std::time::Duration;

use rumqttc::MqttOptions;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{MqttError, MqttResult};

pub const DEFAULT_PORT: u16 = 1883;

/// Broker connection settings for the bridge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Run the bridge at all.
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    /// Pause after a connection error before polling again.
    pub reconnect_delay_ms: u64,
    /// Capacity of the [`DataFeed`](crate::DataFeed) broadcast channel.
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".into(),
            port: DEFAULT_PORT,
            client_id: "pathstore-server".into(),
            username: None,
            password: None,
            keep_alive_secs: 30,
            reconnect_delay_ms: 2_000,
            channel_capacity: 256,
        }
    }
}

impl MqttConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Point at a broker given as `mqtt://host[:port]`, `tcp://host[:port]`
    /// or a bare `host[:port]`. A missing port keeps the current one.
    pub fn set_server(&mut self, server: &str) -> MqttResult<()> {
        let server = server.trim();
        let url = if server.contains("://") {
            Url::parse(server)
        } else {
            Url::parse(&format!("mqtt://{server}"))
        }
        .map_err(|e| MqttError::Config(format!("broker address {server:?}: {e}")))?;

        if !matches!(url.scheme(), "mqtt" | "tcp") {
            return Err(MqttError::Config(format!(
                "unsupported broker scheme {:?}",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| MqttError::Config(format!("broker address {server:?} has no host")))?;

        self.host = host.to_string();
        if let Some(port) = url.port() {
            self.port = port;
        }
        Ok(())
    }

    /// Client options for rumqttc.
    pub fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options.set_keep_alive(self.keep_alive());
        if let Some(user) = &self.username {
            options.set_credentials(user.clone(), self.password.clone().unwrap_or_default());
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = MqttConfig::default();
        assert!(!c.enabled);
        assert_eq!(c.port, 1883);
        assert_eq!(c.keep_alive(), Duration::from_secs(30));
        assert_eq!(c.reconnect_delay(), Duration::from_secs(2));
        assert_eq!(c.channel_capacity, 256);
    }

    #[test]
    fn server_forms() {
        let mut c = MqttConfig::default();
        c.set_server("mqtt://broker.example.org").unwrap();
        assert_eq!((c.host.as_str(), c.port), ("broker.example.org", 1883));

        c.set_server("tcp://10.0.0.5:1999").unwrap();
        assert_eq!((c.host.as_str(), c.port), ("10.0.0.5", 1999));

        c.set_server("plain-host:2000").unwrap();
        assert_eq!((c.host.as_str(), c.port), ("plain-host", 2000));
    }

    #[test]
    fn bad_servers_rejected() {
        let mut c = MqttConfig::default();
        assert!(c.set_server("http://broker.example.org").is_err());
        assert!(c.set_server("mqtt://").is_err());
        assert_eq!(c.host, "localhost");
    }

    #[test]
    fn options_from_config() {
        let c = MqttConfig {
            username: Some("user".into()),
            password: Some("pw".into()),
            ..MqttConfig::default()
        };
        let options = c.options();
        assert_eq!(options.broker_address(), ("localhost".to_string(), 1883));
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let c: MqttConfig = serde_json::from_str(r#"{"enabled": true, "host": "b"}"#).unwrap();
        assert!(c.enabled);
        assert_eq!(c.host, "b");
        assert_eq!(c.reconnect_delay_ms, 2_000);
    }
}
