//! Fixed reply bodies of the node control surface.

pub const LIVE: &str = "live";
pub const FAULTY: &str = "faulty";
pub const NODE_STOPPED: &str = "Node stopped";
pub const STARTED: &str = "Consensus algorithm started";
pub const MESSAGE_RECEIVED: &str = "Message received";
