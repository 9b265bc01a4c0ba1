pub mod broadcast;
pub mod local;
pub mod readiness;

pub use broadcast::{BroadcastError, BroadcastReport, Broadcaster, HttpBroadcaster};
pub use local::InProcessBroadcaster;
pub use readiness::{delay, wait_until_ready, AlwaysReady, FleetReadiness, ReadinessProbe};
