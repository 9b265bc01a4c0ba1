pub mod buffer;
pub mod coin;
pub mod error;
pub mod node;
pub mod resolver;
pub mod round;
pub mod types;

pub use buffer::{Discard, MessageBuffer};
pub use coin::{Coin, FixedCoin, RandomCoin};
pub use error::NodeError;
pub use node::{ConsensusNode, NodeConfig};
pub use resolver::{Resolution, Tally};
pub use round::{Ingest, RoundPhase, RoundState};
pub use types::{Behavior, FaultMode, NodeId, NodeState, Round, Value, Vote};
