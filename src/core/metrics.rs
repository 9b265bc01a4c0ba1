use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::collections::HashMap;

use crate::consensus::NodeId;

/// Per-node protocol counters, registered on a registry labelled with the
/// node id so that several nodes can live in one process.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    pub votes_accepted: IntCounter,
    pub votes_discarded: IntCounter,
    pub rounds_resolved: IntCounter,
    pub decisions: IntCounter,
    pub coin_flips: IntCounter,
    pub broadcasts_sent: IntCounter,
    pub broadcast_failures: IntCounter,
    pub current_round: IntGauge,
}

impl NodeMetrics {
    pub fn new(node_id: NodeId) -> Result<Self, prometheus::Error> {
        let mut labels = HashMap::new();
        labels.insert("node".to_string(), node_id.to_string());
        let registry = Registry::new_custom(Some("benor".to_string()), Some(labels))?;

        let votes_accepted = counter(
            &registry,
            "votes_accepted_total",
            "Votes buffered for the current round",
        )?;
        let votes_discarded = counter(
            &registry,
            "votes_discarded_total",
            "Votes dropped as stale, premature or malformed",
        )?;
        let rounds_resolved = counter(
            &registry,
            "rounds_resolved_total",
            "Rounds closed on quorum",
        )?;
        let decisions = counter(
            &registry,
            "decisions_total",
            "Rounds closed by the majority rule",
        )?;
        let coin_flips = counter(
            &registry,
            "coin_flips_total",
            "Rounds closed by the random fallback",
        )?;
        let broadcasts_sent = counter(
            &registry,
            "votes_sent_total",
            "Votes delivered to peers",
        )?;
        let broadcast_failures = counter(
            &registry,
            "votes_failed_total",
            "Votes that did not reach a peer",
        )?;

        let current_round = IntGauge::with_opts(Opts::new(
            "current_round",
            "Round the node is collecting votes for",
        ))?;
        registry.register(Box::new(current_round.clone()))?;

        Ok(Self {
            registry,
            votes_accepted,
            votes_discarded,
            rounds_resolved,
            decisions,
            coin_flips,
            broadcasts_sent,
            broadcast_failures,
            current_round,
        })
    }

    /// Prometheus text exposition.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let counter = IntCounter::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}
