//! Deterministic random number generation for the authoritative host.
//!
//! ## Key Features
//!
//! - **Deterministic**: Same seed produces identical sequence
//! - **Serializable**: O(1) state capture and restore for checkpoints
//! - **Host-only**: Only a host `Battle` owns a `BattleRng`; guests replay
//!   the outcomes carried in update payloads instead of rolling.
//!
//! ```
//! use battle_sync::core::BattleRng;
//!
//! let mut rng = BattleRng::new(42);
//! let state = rng.state();
//! let first = rng.roll(0.5);
//!
//! let mut restored = BattleRng::from_state(&state);
//! assert_eq!(restored.roll(0.5), first);
//! ```

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Deterministic battle RNG.
///
/// Uses ChaCha8 for speed while keeping a cheap, exact serialisable position.
#[derive(Clone, Debug)]
pub struct BattleRng {
    inner: ChaCha8Rng,
    seed: u64,
}

impl BattleRng {
    /// Create a new RNG with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Bernoulli trial: `true` with the given probability.
    ///
    /// Probabilities outside `[0, 1]` are clamped; NaN never triggers.
    pub fn roll(&mut self, probability: f64) -> bool {
        if probability.is_nan() || probability <= 0.0 {
            return false;
        }
        self.inner.gen_bool(probability.min(1.0))
    }

    /// Uniform float in `[0, 1)`.
    pub fn unit(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// Generate a random usize in the given range.
    pub fn gen_range_usize(&mut self, range: std::ops::Range<usize>) -> usize {
        self.inner.gen_range(range)
    }

    /// Pick a random index into a collection of `len` items.
    ///
    /// Returns `None` for empty collections. Used for tie-breaking among
    /// equally valid targets or spells; the chosen index always travels in
    /// the update payload.
    pub fn choose_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            None
        } else {
            Some(self.inner.gen_range(0..len))
        }
    }

    /// Get the current state for serialization.
    #[must_use]
    pub fn state(&self) -> BattleRngState {
        BattleRngState {
            seed: self.seed,
            word_pos: self.inner.get_word_pos(),
        }
    }

    /// Restore from a saved state.
    #[must_use]
    pub fn from_state(state: &BattleRngState) -> Self {
        let mut inner = ChaCha8Rng::seed_from_u64(state.seed);
        inner.set_word_pos(state.word_pos);
        Self {
            inner,
            seed: state.seed,
        }
    }
}

/// Serializable RNG state for checkpointing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleRngState {
    /// Original seed
    pub seed: u64,
    /// ChaCha8 word position (128-bit counter)
    #[serde(with = "word_pos_string")]
    pub word_pos: u128,
}

// JSON numbers (and `serde_json::Value`) cannot carry a u128.
mod word_pos_string {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}
