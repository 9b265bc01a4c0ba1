use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::types::Value;

/// Source of the uniform {0, 1} draw used when a round has no majority.
pub trait Coin: Send {
    fn toss(&mut self) -> Value;
}

pub struct RandomCoin {
    rng: StdRng,
}

impl RandomCoin {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Coin for RandomCoin {
    fn toss(&mut self) -> Value {
        Value::from(self.rng.gen_bool(0.5))
    }
}

/// Always lands on the same face.
#[derive(Debug, Clone, Copy)]
pub struct FixedCoin(pub Value);

impl Coin for FixedCoin {
    fn toss(&mut self) -> Value {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_coins_repeat() {
        let mut a = RandomCoin::seeded(42);
        let mut b = RandomCoin::seeded(42);
        let left: Vec<Value> = (0..32).map(|_| a.toss()).collect();
        let right: Vec<Value> = (0..32).map(|_| b.toss()).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn test_coin_is_binary_and_lands_on_both_faces() {
        let mut coin = RandomCoin::seeded(7);
        let tosses: Vec<Value> = (0..256).map(|_| coin.toss()).collect();
        assert!(tosses.iter().all(|v| v.is_binary()));
        assert!(tosses.contains(&Value::Zero));
        assert!(tosses.contains(&Value::One));
    }
}
