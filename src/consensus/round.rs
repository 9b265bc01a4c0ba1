use super::buffer::{Discard, MessageBuffer};
use super::coin::Coin;
use super::error::NodeError;
use super::resolver::{self, Resolution};
use super::types::{Behavior, FaultMode, NodeState, Round, Value, Vote};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Idle,
    Broadcasting,
    AwaitingQuorum,
    Resolving,
    Killed,
}

/// Result of handing one vote to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    Buffered { len: usize },
    Discarded(Discard),
    /// Quorum reached for `round`; `next` must be broadcast.
    Resolved {
        round: Round,
        resolution: Resolution,
        next: Vote,
    },
    /// A faulty node reacting to a round it had not voted in yet.
    Echo(Vote),
}

/// Round state of one node. Not synchronized; the owner serializes access.
pub struct RoundState {
    behavior: Behavior,
    total_nodes: usize,
    faulty_nodes: usize,
    killed: bool,
    x: Option<Value>,
    decided: Option<bool>,
    phase: RoundPhase,
    buffer: MessageBuffer,
    coin: Box<dyn Coin>,
    initial_value: Value,
    /// Set once `begin` has handed out the round-0 vote.
    opened: bool,
    last_voted: Option<Round>,
}

impl RoundState {
    pub fn new(
        behavior: Behavior,
        initial_value: Value,
        total_nodes: usize,
        faulty_nodes: usize,
        coin: Box<dyn Coin>,
    ) -> Self {
        let (x, decided) = match behavior {
            Behavior::Correct => (Some(initial_value), Some(false)),
            Behavior::Byzantine(_) => (None, None),
        };

        Self {
            behavior,
            total_nodes,
            faulty_nodes,
            killed: false,
            x,
            decided,
            phase: RoundPhase::Idle,
            buffer: MessageBuffer::new(0),
            coin,
            initial_value,
            opened: false,
            last_voted: None,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn is_killed(&self) -> bool {
        self.killed
    }

    pub fn buffered(&self) -> &[Vote] {
        self.buffer.votes()
    }

    pub fn snapshot(&self) -> NodeState {
        match self.behavior {
            Behavior::Correct => NodeState {
                killed: self.killed,
                x: self.x,
                decided: self.decided,
                k: Some(self.buffer.round()),
            },
            Behavior::Byzantine(_) => NodeState {
                killed: self.killed,
                x: None,
                decided: None,
                k: None,
            },
        }
    }

    fn ensure_live(&self) -> Result<(), NodeError> {
        if self.killed {
            Err(NodeError::NodeStopped)
        } else {
            Ok(())
        }
    }

    /// Yields the round-0 vote exactly once.
    ///
    /// A correct node may already have closed round 0 on votes that arrived
    /// before `start`; it still owes its peers the round-0 vote carrying its
    /// initial value, otherwise they sit one vote short of quorum.
    pub fn begin(&mut self) -> Result<Option<Vote>, NodeError> {
        self.ensure_live()?;
        if self.opened {
            return Ok(None);
        }
        self.opened = true;

        if self.phase == RoundPhase::Idle {
            self.phase = RoundPhase::Broadcasting;
        }
        let opening = match self.behavior {
            Behavior::Correct => Some(Vote::new(0, self.initial_value)),
            Behavior::Byzantine(mode) => self.byzantine_vote(mode, 0),
        };
        Ok(opening)
    }

    /// The outbound vote has been handed to the broadcaster.
    pub fn mark_broadcast(&mut self) {
        if self.phase == RoundPhase::Broadcasting {
            self.phase = RoundPhase::AwaitingQuorum;
        }
    }

    pub fn ingest(&mut self, vote: Vote) -> Result<Ingest, NodeError> {
        self.ensure_live()?;

        if let Behavior::Byzantine(mode) = self.behavior {
            return Ok(match self.byzantine_vote(mode, vote.step) {
                Some(echo) => Ingest::Echo(echo),
                None => Ingest::Discarded(Discard::NotParticipating),
            });
        }

        let len = match self.buffer.accept(vote) {
            Ok(len) => len,
            Err(discard) => return Ok(Ingest::Discarded(discard)),
        };

        if len == resolver::quorum_size(self.total_nodes) {
            Ok(self.resolve_round())
        } else {
            Ok(Ingest::Buffered { len })
        }
    }

    /// Records a vote that could not be decoded. Still gated by `killed`.
    pub fn reject_malformed(&self) -> Result<Ingest, NodeError> {
        self.ensure_live()?;
        Ok(Ingest::Discarded(Discard::Malformed))
    }

    fn resolve_round(&mut self) -> Ingest {
        self.phase = RoundPhase::Resolving;

        let closed = self.buffer.round();
        let resolution = resolver::resolve(
            self.buffer.votes(),
            self.total_nodes,
            self.faulty_nodes,
            self.coin.as_mut(),
        );

        self.x = Some(resolution.value());
        if let Resolution::Decided(_) = resolution {
            self.decided = Some(true);
        }

        let next = closed + 1;
        self.buffer.advance(next);
        self.phase = RoundPhase::Broadcasting;

        Ingest::Resolved {
            round: closed,
            resolution,
            next: Vote::new(next, resolution.value()),
        }
    }

    /// Returns `true` if this call is the one that killed the node.
    pub fn stop(&mut self) -> bool {
        let first = !self.killed;
        self.killed = true;
        self.phase = RoundPhase::Killed;
        first
    }

    /// A faulty node votes at most once per step and never goes back.
    fn byzantine_vote(&mut self, mode: FaultMode, step: Round) -> Option<Vote> {
        if mode == FaultMode::Silent || self.last_voted.map_or(false, |last| step <= last) {
            return None;
        }
        self.last_voted = Some(step);
        let value = match mode {
            FaultMode::Random => self.coin.toss(),
            _ => Value::Unknown,
        };
        Some(Vote::new(step, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::coin::FixedCoin;

    fn correct(initial: Value, n: usize, f: usize) -> RoundState {
        RoundState::new(Behavior::Correct, initial, n, f, Box::new(FixedCoin(Value::Zero)))
    }

    #[test]
    fn test_initial_snapshot() {
        let state = correct(Value::One, 4, 1);
        assert_eq!(
            state.snapshot(),
            NodeState {
                killed: false,
                x: Some(Value::One),
                decided: Some(false),
                k: Some(0),
            }
        );
        assert_eq!(state.phase(), RoundPhase::Idle);
    }

    #[test]
    fn test_begin_yields_opening_vote_once() {
        let mut state = correct(Value::One, 4, 1);
        assert_eq!(state.begin().unwrap(), Some(Vote::new(0, Value::One)));
        assert_eq!(state.phase(), RoundPhase::Broadcasting);
        state.mark_broadcast();
        assert_eq!(state.phase(), RoundPhase::AwaitingQuorum);
        assert_eq!(state.begin().unwrap(), None);
    }

    #[test]
    fn test_begin_after_early_resolution_still_sends_round_zero_vote() {
        let mut state = correct(Value::Zero, 4, 1);
        for _ in 0..3 {
            state.ingest(Vote::new(0, Value::One)).unwrap();
        }
        assert_eq!(state.snapshot().k, Some(1));
        state.mark_broadcast();

        // The round-0 vote carries the initial value, not the resolved one.
        assert_eq!(state.begin().unwrap(), Some(Vote::new(0, Value::Zero)));
        assert_eq!(state.phase(), RoundPhase::AwaitingQuorum);
        assert_eq!(state.begin().unwrap(), None);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.x, Some(Value::One));
        assert_eq!(snapshot.k, Some(1));
    }

    #[test]
    fn test_quorum_resolves_exactly_once() {
        let mut state = correct(Value::Zero, 4, 1);

        assert_eq!(
            state.ingest(Vote::new(0, Value::One)).unwrap(),
            Ingest::Buffered { len: 1 }
        );
        assert_eq!(
            state.ingest(Vote::new(0, Value::One)).unwrap(),
            Ingest::Buffered { len: 2 }
        );
        let outcome = state.ingest(Vote::new(0, Value::One)).unwrap();
        assert_eq!(
            outcome,
            Ingest::Resolved {
                round: 0,
                resolution: Resolution::Decided(Value::One),
                next: Vote::new(1, Value::One),
            }
        );

        assert!(state.buffered().is_empty());
        let snapshot = state.snapshot();
        assert_eq!(snapshot.k, Some(1));
        assert_eq!(snapshot.x, Some(Value::One));
        assert_eq!(snapshot.decided, Some(true));
    }

    #[test]
    fn test_stale_vote_does_not_touch_buffer() {
        let mut state = correct(Value::One, 4, 1);
        for _ in 0..3 {
            state.ingest(Vote::new(0, Value::One)).unwrap();
        }
        state.ingest(Vote::new(1, Value::One)).unwrap();

        let outcome = state.ingest(Vote::new(0, Value::Zero)).unwrap();
        assert_eq!(
            outcome,
            Ingest::Discarded(Discard::Stale { step: 0, current: 1 })
        );
        assert_eq!(state.buffered().len(), 1);
        assert_eq!(state.snapshot().k, Some(1));
    }

    #[test]
    fn test_decided_is_sticky_across_coin_flips() {
        let mut state = correct(Value::One, 4, 1);
        for _ in 0..3 {
            state.ingest(Vote::new(0, Value::One)).unwrap();
        }
        assert_eq!(state.snapshot().decided, Some(true));

        // Round 1 has no majority: the coin moves x but decided stays.
        for _ in 0..3 {
            state.ingest(Vote::new(1, Value::Unknown)).unwrap();
        }
        let snapshot = state.snapshot();
        assert_eq!(snapshot.decided, Some(true));
        assert_eq!(snapshot.x, Some(Value::Zero));
        assert_eq!(snapshot.k, Some(2));
    }

    #[test]
    fn test_stop_freezes_state_and_gates_operations() {
        let mut state = correct(Value::One, 4, 1);
        state.ingest(Vote::new(0, Value::One)).unwrap();

        assert!(state.stop());
        assert!(!state.stop());
        assert_eq!(state.phase(), RoundPhase::Killed);

        assert!(state.ingest(Vote::new(0, Value::One)).unwrap_err().is_stopped());
        assert!(state.begin().unwrap_err().is_stopped());
        assert!(state.reject_malformed().unwrap_err().is_stopped());

        let snapshot = state.snapshot();
        assert!(snapshot.killed);
        assert_eq!(snapshot.x, Some(Value::One));
        assert_eq!(snapshot.k, Some(0));
        assert_eq!(state.buffered().len(), 1);
    }

    #[test]
    fn test_byzantine_never_buffers_and_reports_nulls() {
        let mut state = RoundState::new(
            Behavior::Byzantine(FaultMode::Unknown),
            Value::One,
            4,
            1,
            Box::new(FixedCoin(Value::One)),
        );

        assert_eq!(state.begin().unwrap(), Some(Vote::new(0, Value::Unknown)));
        assert_eq!(
            state.ingest(Vote::new(0, Value::One)).unwrap(),
            Ingest::Discarded(Discard::NotParticipating)
        );
        assert_eq!(
            state.ingest(Vote::new(1, Value::One)).unwrap(),
            Ingest::Echo(Vote::new(1, Value::Unknown))
        );
        assert!(state.buffered().is_empty());

        let snapshot = state.snapshot();
        assert_eq!(snapshot.x, None);
        assert_eq!(snapshot.decided, None);
        assert_eq!(snapshot.k, None);

        state.stop();
        assert!(state.snapshot().killed);
        assert!(state.ingest(Vote::new(2, Value::One)).unwrap_err().is_stopped());
    }

    #[test]
    fn test_silent_and_random_fault_modes() {
        let mut silent = RoundState::new(
            Behavior::Byzantine(FaultMode::Silent),
            Value::Zero,
            4,
            1,
            Box::new(FixedCoin(Value::One)),
        );
        assert_eq!(silent.begin().unwrap(), None);
        assert_eq!(
            silent.ingest(Vote::new(0, Value::One)).unwrap(),
            Ingest::Discarded(Discard::NotParticipating)
        );

        let mut random = RoundState::new(
            Behavior::Byzantine(FaultMode::Random),
            Value::Zero,
            4,
            1,
            Box::new(FixedCoin(Value::One)),
        );
        assert_eq!(
            random.ingest(Vote::new(3, Value::Zero)).unwrap(),
            Ingest::Echo(Vote::new(3, Value::One))
        );
    }

    #[test]
    fn test_byzantine_echoes_only_on_newer_steps() {
        let mut state = RoundState::new(
            Behavior::Byzantine(FaultMode::Unknown),
            Value::One,
            4,
            1,
            Box::new(FixedCoin(Value::One)),
        );
        assert_eq!(
            state.ingest(Vote::new(5, Value::One)).unwrap(),
            Ingest::Echo(Vote::new(5, Value::Unknown))
        );
        for step in [5, 4, 0] {
            assert_eq!(
                state.ingest(Vote::new(step, Value::One)).unwrap(),
                Ingest::Discarded(Discard::NotParticipating)
            );
        }
        // Round 0 has already been passed, so start has nothing to send.
        assert_eq!(state.begin().unwrap(), None);
        assert_eq!(
            state.ingest(Vote::new(u64::MAX, Value::One)).unwrap(),
            Ingest::Echo(Vote::new(u64::MAX, Value::Unknown))
        );
        assert_eq!(
            state.ingest(Vote::new(u64::MAX, Value::Zero)).unwrap(),
            Ingest::Discarded(Discard::NotParticipating)
        );
    }
}
