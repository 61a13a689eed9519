use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the document and short-link row stores.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// PostgreSQL connection string. `None` selects the in-memory backends.
    pub database_url: Option<String>,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
    /// How long to wait for a pooled connection before giving up.
    pub acquire_timeout_ms: u64,
    /// Bound on every store operation as seen by callers.
    pub operation_timeout_ms: u64,
    /// Server-side `statement_timeout` applied to each connection.
    pub statement_timeout_ms: u64,
    /// Rows fetched per page by `allrows`.
    pub page_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 20,
            acquire_timeout_ms: 10_000,
            operation_timeout_ms: 10_000,
            statement_timeout_ms: 5_000,
            page_size: 500,
        }
    }
}

impl StoreConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_memory() {
        let c = StoreConfig::default();
        assert!(c.database_url.is_none());
        assert_eq!(c.operation_timeout(), Duration::from_secs(10));
        assert_eq!(c.page_size, 500);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let c: StoreConfig = serde_json::from_str(r#"{"max_connections": 4}"#).unwrap();
        assert_eq!(c.max_connections, 4);
        assert_eq!(c.statement_timeout_ms, 5_000);
    }
}
