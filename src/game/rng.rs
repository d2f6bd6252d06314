//! Injectable randomness for spawning and alpaca behavior

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Source of uniform random numbers used by the simulation.
///
/// All spawn positions, colours and wander decisions draw from one of these,
/// so a room can be replayed exactly from a seed or a scripted sequence.
pub trait RandomSource: Send {
    /// Uniform value in `[0, 1)`
    fn unit(&mut self) -> f32;

    /// Uniform value in `[lo, hi)`
    fn range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + self.unit() * (hi - lo)
    }

    /// Whole number in `[lo, lo + span)`, i.e. `floor(unit * span) + lo`
    fn whole(&mut self, lo: f32, span: f32) -> f32 {
        (self.unit() * span).floor() + lo
    }

    /// Index into a collection of `len` elements
    fn index(&mut self, len: usize) -> usize {
        let idx = (self.unit() * len as f32).floor() as usize;
        idx.min(len.saturating_sub(1))
    }

    /// Fair coin
    fn coin_flip(&mut self) -> bool {
        self.index(2) == 0
    }
}

/// Deterministic ChaCha8-backed source
pub struct SeededRandom {
    rng: ChaCha8Rng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Seed from OS entropy
    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }
}

impl RandomSource for SeededRandom {
    fn unit(&mut self) -> f32 {
        self.rng.gen_range(0.0..1.0)
    }
}

/// Replays a fixed list of values, cycling when exhausted
#[cfg(test)]
pub struct ScriptedRandom {
    values: Vec<f32>,
    cursor: usize,
}

#[cfg(test)]
impl ScriptedRandom {
    pub fn new(values: Vec<f32>) -> Self {
        assert!(!values.is_empty(), "scripted random needs at least one value");
        Self { values, cursor: 0 }
    }
}

#[cfg(test)]
impl RandomSource for ScriptedRandom {
    fn unit(&mut self) -> f32 {
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value
    }
}
