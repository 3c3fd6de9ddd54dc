//! Battle configuration.
//!
//! Both clients build their `Battle` from the same `BattleConfig` (the host
//! sends it with the roster before the battle starts). Only the host uses
//! `seed`; pacing fields are cosmetic and never feed back into game logic.

use serde::{Deserialize, Serialize};

use crate::combatant::StatusRules;

use super::error::BattleError;

/// Configuration for a single battle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BattleConfig {
    /// Seed for the host's randomness source.
    pub seed: u64,

    /// Round cap. `0` means unlimited; reaching the cap ends in a draw.
    pub max_rounds: u32,

    /// Base delay handed to the presentation layer after each step.
    pub base_action_delay_ms: u64,

    /// Playback speed multiplier (2.0 halves every delay).
    pub speed: f64,

    /// End-of-round tick rules per status kind.
    pub status_rules: StatusRules,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_rounds: 50,
            base_action_delay_ms: 400,
            speed: 1.0,
            status_rules: StatusRules::default(),
        }
    }
}

impl BattleConfig {
    /// Create a configuration with defaults and the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Parse a JSON configuration document; missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, BattleError> {
        serde_json::from_str(json).map_err(BattleError::Config)
    }

    /// Set the round cap.
    #[must_use]
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Set the base action delay.
    #[must_use]
    pub fn with_action_delay_ms(mut self, delay_ms: u64) -> Self {
        self.base_action_delay_ms = delay_ms;
        self
    }

    /// Set the playback speed multiplier.
    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Replace the status tick rules.
    #[must_use]
    pub fn with_status_rules(mut self, rules: StatusRules) -> Self {
        self.status_rules = rules;
        self
    }

    /// Has the battle reached its round cap?
    #[must_use]
    pub fn round_cap_reached(&self, round: u32) -> bool {
        self.max_rounds != 0 && round >= self.max_rounds
    }
}
