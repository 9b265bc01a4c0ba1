use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// The "all peers are up" predicate polled by `start()`.
#[cfg_attr(test, mockall::automock)]
pub trait ReadinessProbe: Send + Sync {
    fn nodes_are_ready(&self) -> bool;
}

/// One flag per node, flipped once its server is listening.
#[derive(Debug)]
pub struct FleetReadiness {
    ready: Vec<AtomicBool>,
}

impl FleetReadiness {
    pub fn new(total_nodes: usize) -> Self {
        Self {
            ready: (0..total_nodes).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    pub fn set_node_ready(&self, index: usize) {
        match self.ready.get(index) {
            Some(flag) => flag.store(true, Ordering::SeqCst),
            None => tracing::warn!("readiness index {} out of range", index),
        }
    }

    pub fn ready_count(&self) -> usize {
        self.ready
            .iter()
            .filter(|flag| flag.load(Ordering::SeqCst))
            .count()
    }
}

impl ReadinessProbe for FleetReadiness {
    fn nodes_are_ready(&self) -> bool {
        self.ready_count() == self.ready.len()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReady;

impl ReadinessProbe for AlwaysReady {
    fn nodes_are_ready(&self) -> bool {
        true
    }
}

/// Cooperative pause between readiness polls.
pub async fn delay(interval: Duration) {
    tokio::time::sleep(interval).await;
}

/// Polls `probe` every `interval` until it holds. Returns the number of
/// pauses taken.
pub async fn wait_until_ready(probe: &dyn ReadinessProbe, interval: Duration) -> usize {
    let mut pauses = 0;
    while !probe.nodes_are_ready() {
        delay(interval).await;
        pauses += 1;
    }
    pauses
}
