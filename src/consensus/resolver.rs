//! Quorum detection and the per-round majority/fallback rule.

use super::coin::Coin;
use super::types::{Value, Vote};

/// Votes needed to close a round: one from every other participant.
pub fn quorum_size(total_nodes: usize) -> usize {
    total_nodes.saturating_sub(1)
}

/// Per-value counts over the concrete votes of one round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub zeros: usize,
    pub ones: usize,
}

impl Tally {
    /// `Unknown` votes are skipped; they only matter for quorum size.
    pub fn from_votes(votes: &[Vote]) -> Self {
        votes.iter().fold(Tally::default(), |mut tally, vote| {
            match vote.value {
                Value::Zero => tally.zeros += 1,
                Value::One => tally.ones += 1,
                Value::Unknown => {}
            }
            tally
        })
    }

    /// Value with the highest count. Ties go to `Zero`.
    pub fn majority(&self) -> Option<(Value, usize)> {
        if self.zeros == 0 && self.ones == 0 {
            None
        } else if self.ones > self.zeros {
            Some((Value::One, self.ones))
        } else {
            Some((Value::Zero, self.zeros))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Strict majority over `(N - F) / 2`: adopt and decide.
    Decided(Value),
    /// No qualifying majority: adopt a coin toss, `decided` untouched.
    CoinFlip(Value),
}

impl Resolution {
    pub fn value(self) -> Value {
        match self {
            Resolution::Decided(v) | Resolution::CoinFlip(v) => v,
        }
    }
}

/// `count > (N - F) / 2`, kept in integers as `2 * count > N - F`.
pub fn exceeds_threshold(count: usize, total_nodes: usize, faulty_nodes: usize) -> bool {
    2 * count > total_nodes.saturating_sub(faulty_nodes)
}

pub fn resolve(
    votes: &[Vote],
    total_nodes: usize,
    faulty_nodes: usize,
    coin: &mut dyn Coin,
) -> Resolution {
    match Tally::from_votes(votes).majority() {
        Some((value, count)) if exceeds_threshold(count, total_nodes, faulty_nodes) => {
            Resolution::Decided(value)
        }
        _ => Resolution::CoinFlip(coin.toss()),
    }
}
