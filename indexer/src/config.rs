//! Indexer configuration with TOML file support.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use govmirror_rpc::ClientOptions;
use govmirror_types::NetworkId;

use crate::logging::LogFormat;
use crate::IndexerError;

/// Configuration for the indexer daemon.
///
/// Can be loaded from a TOML file via [`IndexerConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Directory holding the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter, e.g. "info" or "debug,govmirror_rpc=trace".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between reconciliation cycles of a network.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Width of the per-cycle worker pool.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Deadline of a single RPC round trip.
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,

    /// Deadline for opening a WebSocket to one endpoint.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Keys requested per `state_getKeysPaged` call.
    #[serde(default = "default_keys_page_size")]
    pub keys_page_size: u32,

    /// Serve Prometheus metrics on this port when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,

    #[serde(default = "default_networks")]
    pub networks: Vec<NetworkConfig>,
}

/// One chain to mirror.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub id: NetworkId,
    pub name: String,
    /// SS58 address prefix used to render submitters.
    #[serde(default)]
    pub ss58_prefix: u16,
    /// WebSocket endpoints, tried in order.
    pub endpoints: Vec<String>,
    /// Overrides the global polling interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./govmirror_data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_workers() -> usize {
    4
}

fn default_rpc_timeout_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_keys_page_size() -> u32 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_networks() -> Vec<NetworkConfig> {
    vec![
        NetworkConfig {
            id: NetworkId::new(0),
            name: "polkadot".to_string(),
            ss58_prefix: 0,
            endpoints: vec![
                "wss://rpc.polkadot.io".to_string(),
                "wss://polkadot-rpc.dwellir.com".to_string(),
            ],
            poll_interval_secs: None,
            enabled: true,
        },
        NetworkConfig {
            id: NetworkId::new(1),
            name: "kusama".to_string(),
            ss58_prefix: 2,
            endpoints: vec![
                "wss://kusama-rpc.polkadot.io".to_string(),
                "wss://kusama-rpc.dwellir.com".to_string(),
            ],
            poll_interval_secs: None,
            enabled: true,
        },
    ]
}

// ── Impl ───────────────────────────────────────────────────────────────

impl IndexerConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, IndexerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| IndexerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, IndexerError> {
        let config: Self = toml::from_str(s).map_err(|e| IndexerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, IndexerError> {
        toml::to_string_pretty(self).map_err(|e| IndexerError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.workers == 0 {
            return Err(IndexerError::Config("workers must be at least 1".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(IndexerError::Config("poll_interval_secs must be at least 1".into()));
        }
        if self.rpc_timeout_secs == 0 {
            return Err(IndexerError::Config("rpc_timeout_secs must be at least 1".into()));
        }
        if self.networks.is_empty() {
            return Err(IndexerError::Config("no networks configured".into()));
        }

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for network in &self.networks {
            if !ids.insert(network.id) {
                return Err(IndexerError::Config(format!(
                    "duplicate network id {}",
                    network.id
                )));
            }
            if network.name.is_empty() {
                return Err(IndexerError::Config(format!(
                    "network {} has an empty name",
                    network.id
                )));
            }
            // Lookup by name ignores ASCII case.
            if !names.insert(network.name.to_ascii_lowercase()) {
                return Err(IndexerError::Config(format!(
                    "duplicate network name {:?}",
                    network.name
                )));
            }
            if network.endpoints.is_empty() {
                return Err(IndexerError::Config(format!(
                    "network {:?} has no endpoints",
                    network.name
                )));
            }
            if network.poll_interval_secs == Some(0) {
                return Err(IndexerError::Config(format!(
                    "network {:?}: poll_interval_secs must be at least 1",
                    network.name
                )));
            }
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// RPC client settings derived from this configuration.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            connect_timeout: self.connect_timeout(),
            request_timeout: self.rpc_timeout(),
            keys_page_size: self.keys_page_size,
        }
    }

    /// Effective polling interval of `network`.
    pub fn poll_interval(&self, network: &NetworkConfig) -> Duration {
        Duration::from_secs(network.poll_interval_secs.unwrap_or(self.poll_interval_secs))
    }

    /// Look a network up by name or numeric id.
    pub fn network(&self, key: &str) -> Result<&NetworkConfig, IndexerError> {
        let by_id = key.parse::<u16>().ok().map(NetworkId::new);
        self.networks
            .iter()
            .find(|n| n.name.eq_ignore_ascii_case(key) || Some(n.id) == by_id)
            .ok_or_else(|| IndexerError::UnknownNetwork(key.to_string()))
    }

    pub fn enabled_networks(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.networks.iter().filter(|n| n.enabled)
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            poll_interval_secs: default_poll_interval_secs(),
            workers: default_workers(),
            rpc_timeout_secs: default_rpc_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            keys_page_size: default_keys_page_size(),
            metrics_port: None,
            networks: default_networks(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = IndexerConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = IndexerConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = IndexerConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.workers, 4);
        assert_eq!(config.rpc_timeout_secs, 10);
        assert_eq!(config.keys_page_size, 1000);
        assert_eq!(config.log_format, LogFormat::Human);
        assert_eq!(config.networks.len(), 2);
    }

    #[test]
    fn networks_table_replaces_defaults() {
        let toml = r#"
            workers = 8
            log_format = "json"

            [[networks]]
            id = 7
            name = "westend"
            ss58_prefix = 42
            endpoints = ["ws://127.0.0.1:9944", "wss://westend-rpc.polkadot.io"]
            poll_interval_secs = 15
        "#;
        let config = IndexerConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.workers, 8);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.networks.len(), 1);
        let westend = config.network("westend").unwrap();
        assert_eq!(westend.id, NetworkId::new(7));
        assert!(westend.enabled);
        assert_eq!(config.poll_interval(westend), Duration::from_secs(15));
        assert_eq!(config.network("7").unwrap().name, "westend");
    }

    #[test]
    fn unknown_network_lookup() {
        let config = IndexerConfig::default();
        assert!(matches!(
            config.network("rococo"),
            Err(IndexerError::UnknownNetwork(_))
        ));
        assert_eq!(config.network("KUSAMA").unwrap().ss58_prefix, 2);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let toml = r#"
            [[networks]]
            id = 1
            name = "a"
            endpoints = ["ws://a"]

            [[networks]]
            id = 1
            name = "b"
            endpoints = ["ws://b"]
        "#;
        let err = IndexerConfig::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("duplicate network id"));
    }

    #[test]
    fn rejects_duplicate_names_and_empty_endpoints() {
        let dup = r#"
            [[networks]]
            id = 1
            name = "a"
            endpoints = ["ws://a"]

            [[networks]]
            id = 2
            name = "a"
            endpoints = ["ws://b"]
        "#;
        assert!(IndexerConfig::from_toml_str(dup).is_err());

        let empty = r#"
            [[networks]]
            id = 1
            name = "a"
            endpoints = []
        "#;
        let err = IndexerConfig::from_toml_str(empty).unwrap_err();
        assert!(err.to_string().contains("no endpoints"));
    }

    #[test]
    fn rejects_names_differing_only_in_case() {
        let toml = r#"
            [[networks]]
            id = 0
            name = "Polkadot"
            endpoints = ["ws://a"]

            [[networks]]
            id = 1
            name = "polkadot"
            endpoints = ["ws://b"]
        "#;
        let err = IndexerConfig::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("duplicate network name"), "{err}");
    }

    #[test]
    fn rejects_zero_workers() {
        let err = IndexerConfig::from_toml_str("workers = 0").unwrap_err();
        assert!(matches!(err, IndexerError::Config(_)));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = IndexerConfig::from_toml_file(Path::new("/nonexistent/govmirror.toml"));
        assert!(matches!(result, Err(IndexerError::Config(_))));
    }
}
