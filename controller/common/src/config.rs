use crate::scheduler::WorkerConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_CORE_METADATA_ADDR: &str = "edgex-core-metadata:59881";
pub const DEFAULT_CORE_COMMAND_ADDR: &str = "edgex-core-command:59882";
pub const DEFAULT_PROBE_ADDR: &str = "0.0.0.0:8080";

fn default_core_metadata_addr() -> String {
    DEFAULT_CORE_METADATA_ADDR.to_owned()
}

fn default_core_command_addr() -> String {
    DEFAULT_CORE_COMMAND_ADDR.to_owned()
}

fn default_probe_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_workers() -> usize {
    4
}

fn default_error_backoff_secs() -> u64 {
    10
}

fn default_edge_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Node pool served by this controller. Objects of other pools are ignored.
    pub node_pool: String,
    /// Namespace to watch; every namespace when unset.
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_core_metadata_addr")]
    pub core_metadata_addr: String,
    #[serde(default = "default_core_command_addr")]
    pub core_command_addr: String,
    #[serde(default = "default_probe_addr")]
    pub probe_addr: SocketAddr,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
    /// Timeout of a single request to the edge platform.
    #[serde(default = "default_edge_timeout_secs")]
    pub edge_timeout_secs: u64,
}

impl Config {
    pub fn new(node_pool: impl Into<String>) -> Self {
        Config {
            node_pool: node_pool.into(),
            namespace: None,
            core_metadata_addr: default_core_metadata_addr(),
            core_command_addr: default_core_command_addr(),
            probe_addr: default_probe_addr(),
            workers: default_workers(),
            error_backoff_secs: default_error_backoff_secs(),
            edge_timeout_secs: default_edge_timeout_secs(),
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            workers: self.workers,
            error_backoff: Duration::from_secs(self.error_backoff_secs),
        }
    }

    pub fn edge_timeout(&self) -> Duration {
        Duration::from_secs(self.edge_timeout_secs)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: Config = serde_json::from_str(r#"{ "nodePool": "hangzhou" }"#).unwrap();
        assert_eq!(config.node_pool, "hangzhou");
        assert_eq!(config.namespace, None);
        assert_eq!(config.core_metadata_addr, DEFAULT_CORE_METADATA_ADDR);
        assert_eq!(config.core_command_addr, DEFAULT_CORE_COMMAND_ADDR);
        assert_eq!(config.probe_addr.to_string(), DEFAULT_PROBE_ADDR);
        assert_eq!(config.worker_config().workers, 4);
        assert_eq!(config.worker_config().error_backoff, Duration::from_secs(10));
    }

    #[test]
    fn node_pool_is_required() {
        assert!(serde_json::from_str::<Config>("{}").is_err());
    }
}
