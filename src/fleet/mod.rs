//! Builds and drives a fleet of N nodes, either behind real HTTP servers
//! (one port per node) or wired together in-process.

use anyhow::{Context, Result};
use futures::future::join_all;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api;
use crate::consensus::{
    Behavior, Coin, ConsensusNode, FaultMode, NodeConfig, NodeError, NodeId, NodeState,
    RandomCoin, Value,
};
use crate::core::Config;
use crate::network::{
    AlwaysReady, Broadcaster, FleetReadiness, HttpBroadcaster, InProcessBroadcaster,
    ReadinessProbe,
};

#[derive(Debug, Clone)]
pub struct FleetSpec {
    pub total_nodes: usize,
    pub faulty_nodes: usize,
    pub initial_values: Vec<Value>,
    pub faulty_ids: Vec<NodeId>,
    pub fault_mode: FaultMode,
    pub host: String,
    pub base_port: u16,
    pub broadcast_timeout: Duration,
    pub ready_poll_interval: Duration,
    pub coin_seed: Option<u64>,
}

impl FleetSpec {
    /// Fleet with the last `faulty_nodes` ids faulty, on localhost.
    pub fn new(initial_values: Vec<Value>, faulty_nodes: usize) -> Self {
        let total_nodes = initial_values.len();
        Self {
            total_nodes,
            faulty_nodes,
            faulty_ids: (total_nodes.saturating_sub(faulty_nodes)..total_nodes).collect(),
            initial_values,
            fault_mode: FaultMode::default(),
            host: "127.0.0.1".to_string(),
            base_port: 3000,
            broadcast_timeout: Duration::from_secs(1),
            ready_poll_interval: Duration::from_millis(10),
            coin_seed: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            total_nodes: config.cluster.total_nodes,
            faulty_nodes: config.cluster.faulty_nodes,
            initial_values: config.cluster.initial_values.clone(),
            faulty_ids: config.cluster.faulty_ids.clone(),
            fault_mode: config.cluster.fault_mode,
            host: config.network.host.clone(),
            base_port: config.network.base_port,
            broadcast_timeout: config.network.broadcast_timeout,
            ready_poll_interval: config.protocol.ready_poll_interval,
            coin_seed: config.protocol.coin_seed,
        }
    }

    pub fn with_base_port(mut self, base_port: u16) -> Self {
        self.base_port = base_port;
        self
    }

    pub fn with_coin_seed(mut self, seed: u64) -> Self {
        self.coin_seed = Some(seed);
        self
    }

    pub fn with_fault_mode(mut self, fault_mode: FaultMode) -> Self {
        self.fault_mode = fault_mode;
        self
    }

    pub fn with_faulty_ids(mut self, faulty_ids: Vec<NodeId>) -> Self {
        self.faulty_ids = faulty_ids;
        self
    }

    pub fn node_config(&self, id: NodeId) -> NodeConfig {
        let behavior = if self.faulty_ids.contains(&id) {
            Behavior::Byzantine(self.fault_mode)
        } else {
            Behavior::Correct
        };

        NodeConfig {
            id,
            total_nodes: self.total_nodes,
            faulty_nodes: self.faulty_nodes,
            initial_value: self.initial_values.get(id).copied().unwrap_or(Value::Unknown),
            behavior,
            ready_poll_interval: self.ready_poll_interval,
        }
    }

    fn coin(&self, id: NodeId) -> Box<dyn Coin> {
        match self.coin_seed {
            Some(seed) => Box::new(RandomCoin::seeded(seed.wrapping_add(id as u64))),
            None => Box::new(RandomCoin::from_entropy()),
        }
    }

    fn port_of(&self, id: NodeId) -> Result<u16> {
        u16::try_from(self.base_port as usize + id)
            .with_context(|| format!("port for node {} overflows", id))
    }
}

pub struct Fleet {
    nodes: Vec<Arc<ConsensusNode>>,
    servers: Vec<JoinHandle<()>>,
    shutdown: Vec<oneshot::Sender<()>>,
}

impl Fleet {
    pub fn build_nodes(
        spec: &FleetSpec,
        broadcaster: Arc<dyn Broadcaster>,
        readiness: Arc<dyn ReadinessProbe>,
    ) -> Result<Vec<Arc<ConsensusNode>>, NodeError> {
        (0..spec.total_nodes)
            .map(|id| {
                ConsensusNode::new(
                    spec.node_config(id),
                    spec.coin(id),
                    broadcaster.clone(),
                    readiness.clone(),
                )
            })
            .collect()
    }

    /// Binds one HTTP server per node on `base_port + id`. Each node is
    /// marked ready as soon as its listener is bound.
    pub async fn launch(spec: FleetSpec) -> Result<Self> {
        let host: IpAddr = spec
            .host
            .parse()
            .with_context(|| format!("invalid host '{}'", spec.host))?;
        let readiness = Arc::new(FleetReadiness::new(spec.total_nodes));
        let broadcaster = Arc::new(HttpBroadcaster::new(
            spec.host.clone(),
            spec.base_port,
            spec.broadcast_timeout,
        )?);

        let nodes = Self::build_nodes(&spec, broadcaster, readiness.clone())?;

        let mut servers = Vec::with_capacity(nodes.len());
        let mut shutdown = Vec::with_capacity(nodes.len());

        for node in &nodes {
            let addr = SocketAddr::new(host, spec.port_of(node.id())?);
            let (tx, rx) = oneshot::channel::<()>();

            let (bound, server) = warp::serve(api::routes(node.clone()))
                .try_bind_with_graceful_shutdown(addr, async move {
                    rx.await.ok();
                })
                .with_context(|| format!("Failed to bind node {} on {}", node.id(), addr))?;

            servers.push(tokio::spawn(server));
            shutdown.push(tx);
            readiness.set_node_ready(node.id());

            tracing::info!(
                "Node {} is listening on port {}{}",
                node.id(),
                bound.port(),
                if node.is_faulty() { " (faulty)" } else { "" }
            );
        }

        Ok(Self {
            nodes,
            servers,
            shutdown,
        })
    }

    /// Socket-free fleet: votes are delivered by direct calls.
    pub async fn simulate(spec: FleetSpec) -> Result<Self> {
        let broadcaster = Arc::new(InProcessBroadcaster::new());
        let nodes = Self::build_nodes(&spec, broadcaster.clone(), Arc::new(AlwaysReady))?;
        broadcaster.attach(&nodes).await;

        Ok(Self {
            nodes,
            servers: Vec::new(),
            shutdown: Vec::new(),
        })
    }

    pub fn nodes(&self) -> &[Arc<ConsensusNode>] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Arc<ConsensusNode>> {
        self.nodes.get(id)
    }

    pub async fn start_all(&self) -> Vec<Result<(), NodeError>> {
        join_all(self.nodes.iter().map(|node| node.start())).await
    }

    pub async fn stop_all(&self) {
        join_all(self.nodes.iter().map(|node| node.stop())).await;
    }

    pub async fn states(&self) -> Vec<NodeState> {
        join_all(self.nodes.iter().map(|node| node.state())).await
    }

    /// True once every correct, live node reports `decided`.
    pub async fn all_correct_decided(&self) -> bool {
        for node in self.nodes.iter().filter(|node| !node.is_faulty()) {
            let state = node.state().await;
            if !state.killed && state.decided != Some(true) {
                return false;
            }
        }
        true
    }

    /// Polls until every correct node has decided or `limit` elapses.
    pub async fn wait_until_decided(&self, limit: Duration) -> bool {
        let poll = async {
            while !self.all_correct_decided().await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(limit, poll).await.is_ok()
    }

    pub async fn log_states(&self) {
        for (id, state) in self.states().await.into_iter().enumerate() {
            let show = |v: Option<String>| v.unwrap_or_else(|| "null".to_string());
            tracing::info!(
                "📊 node {}: killed={} x={} decided={} k={}",
                id,
                state.killed,
                show(state.x.map(|x| x.to_string())),
                show(state.decided.map(|d| d.to_string())),
                show(state.k.map(|k| k.to_string())),
            );
        }
    }

    /// Stops accepting connections and waits for the servers to drain.
    pub async fn shutdown(self) {
        for tx in self.shutdown {
            let _ = tx.send(());
        }
        for handle in self.servers {
            if let Err(e) = handle.await {
                tracing::warn!("server task ended abnormally: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_marks_trailing_nodes_faulty() {
        let spec = FleetSpec::new(vec![Value::One; 4], 1);
        assert_eq!(spec.faulty_ids, vec![3]);
        assert_eq!(spec.node_config(0).behavior, Behavior::Correct);
        assert_eq!(
            spec.node_config(3).behavior,
            Behavior::Byzantine(FaultMode::Unknown)
        );
    }

    #[test]
    fn test_port_overflow_is_an_error() {
        let spec = FleetSpec::new(vec![Value::One; 4], 0).with_base_port(u16::MAX);
        assert!(spec.port_of(0).is_ok());
        assert!(spec.port_of(1).is_err());
    }
}
