use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    /// Any mutating operation after `stop()`.
    #[error("Node stopped")]
    NodeStopped,

    #[error("metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl NodeError {
    pub fn is_stopped(&self) -> bool {
        matches!(self, NodeError::NodeStopped)
    }
}
