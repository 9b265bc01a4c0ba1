use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::buffer::Discard;
use super::coin::Coin;
use super::error::NodeError;
use super::resolver::Resolution;
use super::round::{Ingest, RoundPhase, RoundState};
use super::types::{Behavior, NodeId, NodeState, Value, Vote};
use crate::core::metrics::NodeMetrics;
use crate::network::broadcast::Broadcaster;
use crate::network::readiness::{self, ReadinessProbe};

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub id: NodeId,
    pub total_nodes: usize,
    pub faulty_nodes: usize,
    pub initial_value: Value,
    pub behavior: Behavior,
    pub ready_poll_interval: Duration,
}

/// One protocol participant.
///
/// All round state sits behind a single mutex that is held for the whole
/// check-append-resolve sequence, so quorum detection and the buffer reset
/// are atomic with respect to concurrent votes.
pub struct ConsensusNode {
    id: NodeId,
    total_nodes: usize,
    behavior: Behavior,
    poll_interval: Duration,
    state: Mutex<RoundState>,
    broadcaster: Arc<dyn Broadcaster>,
    readiness: Arc<dyn ReadinessProbe>,
    metrics: NodeMetrics,
}

impl ConsensusNode {
    pub fn new(
        config: NodeConfig,
        coin: Box<dyn Coin>,
        broadcaster: Arc<dyn Broadcaster>,
        readiness: Arc<dyn ReadinessProbe>,
    ) -> Result<Arc<Self>, NodeError> {
        let metrics = NodeMetrics::new(config.id)?;
        let state = RoundState::new(
            config.behavior,
            config.initial_value,
            config.total_nodes,
            config.faulty_nodes,
            coin,
        );

        Ok(Arc::new(Self {
            id: config.id,
            total_nodes: config.total_nodes,
            behavior: config.behavior,
            poll_interval: config.ready_poll_interval,
            state: Mutex::new(state),
            broadcaster,
            readiness,
            metrics,
        }))
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn is_faulty(&self) -> bool {
        self.behavior.is_faulty()
    }

    pub fn metrics(&self) -> &NodeMetrics {
        &self.metrics
    }

    pub async fn state(&self) -> NodeState {
        self.state.lock().await.snapshot()
    }

    pub async fn phase(&self) -> RoundPhase {
        self.state.lock().await.phase()
    }

    pub async fn buffered_votes(&self) -> Vec<Vote> {
        self.state.lock().await.buffered().to_vec()
    }

    /// Waits for the fleet, then sends this node's round-0 vote.
    pub async fn start(&self) -> Result<(), NodeError> {
        if self.state.lock().await.is_killed() {
            return Err(NodeError::NodeStopped);
        }

        let pauses = readiness::wait_until_ready(self.readiness.as_ref(), self.poll_interval).await;
        if pauses > 0 {
            tracing::debug!(node = self.id, pauses, "peers ready");
        }

        let mut state = self.state.lock().await;
        match state.begin()? {
            Some(vote) => {
                tracing::info!(
                    node = self.id,
                    step = vote.step,
                    value = %vote.value,
                    "🚀 consensus started"
                );
                self.dispatch(vote);
            }
            None => tracing::debug!(node = self.id, "start ignored, round 0 already opened"),
        }
        state.mark_broadcast();
        Ok(())
    }

    pub async fn receive_vote(&self, vote: Vote) -> Result<Ingest, NodeError> {
        let mut state = self.state.lock().await;
        let outcome = state.ingest(vote)?;
        self.observe(&outcome);

        match outcome {
            Ingest::Resolved { next, .. } => {
                self.dispatch(next);
                state.mark_broadcast();
            }
            Ingest::Echo(vote) => self.dispatch(vote),
            Ingest::Buffered { .. } | Ingest::Discarded(_) => {}
        }
        Ok(outcome)
    }

    /// Entry point for raw `POST /message` bodies. Undecodable votes are
    /// dropped like stale ones.
    pub async fn receive_raw(&self, body: &[u8]) -> Result<Ingest, NodeError> {
        match serde_json::from_slice::<Vote>(body) {
            Ok(vote) => self.receive_vote(vote).await,
            Err(e) => {
                let outcome = self.state.lock().await.reject_malformed()?;
                tracing::debug!(node = self.id, "malformed vote dropped: {}", e);
                self.observe(&outcome);
                Ok(outcome)
            }
        }
    }

    pub async fn stop(&self) {
        if self.state.lock().await.stop() {
            tracing::info!(node = self.id, "🛑 node stopped");
        }
    }

    fn observe(&self, outcome: &Ingest) {
        match outcome {
            Ingest::Buffered { .. } => self.metrics.votes_accepted.inc(),
            Ingest::Discarded(Discard::NotParticipating) | Ingest::Echo(_) => {}
            Ingest::Discarded(discard) => {
                self.metrics.votes_discarded.inc();
                tracing::debug!(node = self.id, ?discard, "vote discarded");
            }
            Ingest::Resolved {
                round,
                resolution,
                next,
            } => {
                self.metrics.votes_accepted.inc();
                self.metrics.rounds_resolved.inc();
                self.metrics.current_round.set(next.step as i64);
                match resolution {
                    Resolution::Decided(value) => {
                        self.metrics.decisions.inc();
                        tracing::info!(node = self.id, round, value = %value, "✅ decided");
                    }
                    Resolution::CoinFlip(value) => {
                        self.metrics.coin_flips.inc();
                        tracing::info!(
                            node = self.id,
                            round,
                            value = %value,
                            "🎲 no majority, coin flipped"
                        );
                    }
                }
            }
        }
    }

    /// Fire-and-forget fan-out of `vote`.
    fn dispatch(&self, vote: Vote) {
        let broadcaster = self.broadcaster.clone();
        let metrics = self.metrics.clone();
        let (from, total_nodes) = (self.id, self.total_nodes);

        tokio::spawn(async move {
            let report = broadcaster.broadcast(from, total_nodes, vote).await;
            metrics.broadcasts_sent.inc_by(report.delivered as u64);
            metrics.broadcast_failures.inc_by(report.failed as u64);
            if report.failed > 0 {
                tracing::warn!(
                    node = from,
                    step = vote.step,
                    delivered = report.delivered,
                    failed = report.failed,
                    "vote only partially delivered"
                );
            }
        });
    }
}
