use anyhow::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::consensus::{FaultMode, NodeId, Value};

const DEFAULT_VALUE_PATTERN: [Value; 4] = [Value::One, Value::One, Value::One, Value::Zero];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("a fleet needs at least one node")]
    NoNodes,

    #[error("{key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("expected {expected} initial values, got {got}")]
    InitialValuesMismatch { expected: usize, got: usize },

    #[error("faulty node id {id} out of range for {total} nodes")]
    FaultyOutOfRange { id: NodeId, total: usize },

    #[error("BENOR_FAULTY is {expected} but {got} faulty node ids were listed")]
    FaultyCountMismatch { expected: usize, got: usize },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub cluster: ClusterConfig,
    pub network: NetworkConfig,
    pub protocol: ProtocolConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub total_nodes: usize,
    pub faulty_nodes: usize,
    pub initial_values: Vec<Value>,
    pub faulty_ids: Vec<NodeId>,
    pub fault_mode: FaultMode,
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub host: String,
    pub base_port: u16,
    pub broadcast_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    pub ready_poll_interval: Duration,
    pub coin_seed: Option<u64>,
    pub auto_start: bool,
}

#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub report_interval: Duration,
}

impl ClusterConfig {
    /// `N > 2F`, the bound under which correct nodes are expected to agree.
    pub fn tolerates_faults(&self) -> bool {
        self.total_nodes > 2 * self.faulty_nodes
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Builds the configuration from any key lookup, defaults applied.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let total_nodes: usize = parse_or(&var_or("BENOR_NODES", "4"), 4);
        let faulty_nodes: usize = parse_or(&var_or("BENOR_FAULTY", "1"), 1);

        let initial_values = match lookup("BENOR_INITIAL_VALUES") {
            Some(raw) => parse_list::<Value>(&raw, "BENOR_INITIAL_VALUES")?,
            None => DEFAULT_VALUE_PATTERN
                .iter()
                .copied()
                .cycle()
                .take(total_nodes)
                .collect(),
        };

        let faulty_ids = match lookup("BENOR_FAULTY_NODES") {
            Some(raw) => parse_list::<NodeId>(&raw, "BENOR_FAULTY_NODES")?,
            None => (total_nodes.saturating_sub(faulty_nodes)..total_nodes).collect(),
        };

        let fault_mode = var_or("BENOR_FAULT_MODE", "unknown")
            .parse::<FaultMode>()
            .map_err(|reason| ConfigError::Invalid {
                key: "BENOR_FAULT_MODE",
                reason,
            })?;

        let coin_seed = match lookup("BENOR_COIN_SEED") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: "BENOR_COIN_SEED",
                reason: e.to_string(),
            })?),
            None => None,
        };

        let config = Config {
            cluster: ClusterConfig {
                total_nodes,
                faulty_nodes,
                initial_values,
                faulty_ids,
                fault_mode,
            },
            network: NetworkConfig {
                host: var_or("BENOR_HOST", "127.0.0.1"),
                base_port: parse_or(&var_or("BASE_NODE_PORT", "3000"), 3000),
                broadcast_timeout: Duration::from_millis(parse_or(
                    &var_or("BENOR_BROADCAST_TIMEOUT_MS", "1000"),
                    1000,
                )),
            },
            protocol: ProtocolConfig {
                ready_poll_interval: Duration::from_millis(parse_or(
                    &var_or("BENOR_READY_POLL_MS", "100"),
                    100,
                )),
                coin_seed,
                auto_start: parse_or(&var_or("BENOR_AUTOSTART", "true"), true),
            },
            monitoring: MonitoringConfig {
                log_level: var_or("LOG_LEVEL", "info"),
                report_interval: Duration::from_secs(parse_or(
                    &var_or("BENOR_REPORT_INTERVAL_SECS", "5"),
                    5,
                )),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let cluster = &self.cluster;
        if cluster.total_nodes == 0 {
            return Err(ConfigError::NoNodes);
        }
        if cluster.initial_values.len() != cluster.total_nodes {
            return Err(ConfigError::InitialValuesMismatch {
                expected: cluster.total_nodes,
                got: cluster.initial_values.len(),
            });
        }
        if let Some(&id) = cluster.faulty_ids.iter().find(|id| **id >= cluster.total_nodes) {
            return Err(ConfigError::FaultyOutOfRange {
                id,
                total: cluster.total_nodes,
            });
        }
        if cluster.faulty_ids.len() != cluster.faulty_nodes {
            return Err(ConfigError::FaultyCountMismatch {
                expected: cluster.faulty_nodes,
                got: cluster.faulty_ids.len(),
            });
        }
        if !cluster.tolerates_faults() {
            tracing::warn!(
                "⚠️  N={} does not exceed 2F={}, agreement is not expected",
                cluster.total_nodes,
                2 * cluster.faulty_nodes
            );
        }
        Ok(())
    }
}

fn parse_or<T: FromStr>(raw: &str, default: T) -> T {
    raw.trim().parse().unwrap_or(default)
}

fn parse_list<T>(raw: &str, key: &'static str) -> Result<Vec<T>, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })
        })
        .collect()
}
