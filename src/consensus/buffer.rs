use super::types::{Round, Vote};

/// Why a vote did not make it into the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    Stale { step: Round, current: Round },
    Premature { step: Round, current: Round },
    Malformed,
    NotParticipating,
}

/// Votes accepted for the node's current round, in arrival order.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    round: Round,
    votes: Vec<Vote>,
}

impl MessageBuffer {
    pub fn new(round: Round) -> Self {
        Self {
            round,
            votes: Vec::new(),
        }
    }

    pub fn round(&self) -> Round {
        self.round
    }

    /// Appends `vote` when it belongs to the buffered round.
    pub fn accept(&mut self, vote: Vote) -> Result<usize, Discard> {
        if vote.step < self.round {
            return Err(Discard::Stale {
                step: vote.step,
                current: self.round,
            });
        }
        if vote.step > self.round {
            return Err(Discard::Premature {
                step: vote.step,
                current: self.round,
            });
        }

        self.votes.push(vote);
        Ok(self.votes.len())
    }

    pub fn votes(&self) -> &[Vote] {
        &self.votes
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Empties the buffer and rescopes it to `next`.
    pub fn advance(&mut self, next: Round) {
        self.round = next;
        self.votes.clear();
    }
}
