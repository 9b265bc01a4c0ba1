use async_trait::async_trait;
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;

use super::broadcast::{BroadcastReport, Broadcaster};
use crate::consensus::{ConsensusNode, NodeId, Vote};

/// Delivers votes by calling peers directly. Used for socket-free fleets.
///
/// Holds weak references so the node <-> broadcaster cycle does not leak.
#[derive(Default)]
pub struct InProcessBroadcaster {
    peers: RwLock<Vec<Weak<ConsensusNode>>>,
}

impl InProcessBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the fleet. Index in `nodes` must equal the node id.
    pub async fn attach(&self, nodes: &[Arc<ConsensusNode>]) {
        let mut peers = self.peers.write().await;
        *peers = nodes.iter().map(Arc::downgrade).collect();
    }
}

#[async_trait]
impl Broadcaster for InProcessBroadcaster {
    async fn broadcast(&self, from: NodeId, total_nodes: usize, vote: Vote) -> BroadcastReport {
        let targets: Vec<Option<Arc<ConsensusNode>>> = {
            let peers = self.peers.read().await;
            (0..total_nodes)
                .filter(|peer| *peer != from)
                .map(|peer| peers.get(peer).and_then(Weak::upgrade))
                .collect()
        };

        let mut report = BroadcastReport::default();
        for target in targets {
            match target {
                Some(peer) => {
                    let result = peer.receive_vote(vote).await.map(|_| ());
                    report.record(&result);
                }
                None => report.failed += 1,
            }
        }
        report
    }
}
