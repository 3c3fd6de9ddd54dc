//! Combatant lookup keys.
//!
//! Combatants are never referenced by pointer outside the `Battle`: they can
//! die, revive or be replaced mid-turn. Handlers, payloads and checkpoints
//! name them by `(absolute side, position, creature index)` instead.
//!
//! ## Usage
//!
//! ```
//! use battle_sync::core::{AbsoluteSide, CombatantKey, Position};
//!
//! let hero = CombatantKey::hero(AbsoluteSide::Host, Position::Left);
//! let first_creature = hero.creature(0);
//!
//! assert!(hero.is_hero());
//! assert_eq!(first_creature.hero_key(), hero);
//! ```

use serde::{Deserialize, Serialize};

use super::side::AbsoluteSide;

/// Hero slot on a side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Left,
    Center,
    Right,
}

impl Position {
    /// All positions in scheduling order.
    pub const ALL: [Position; 3] = [Position::Left, Position::Center, Position::Right];

    /// Slot index (0..3).
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Positions ordered by targeting preference for an attacker standing
    /// in `self`: the facing slot first, then the rest left to right.
    #[must_use]
    pub fn facing_order(self) -> [Position; 3] {
        match self {
            Position::Left => [Position::Left, Position::Center, Position::Right],
            Position::Center => [Position::Center, Position::Left, Position::Right],
            Position::Right => [Position::Right, Position::Left, Position::Center],
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Position::Left => write!(f, "left"),
            Position::Center => write!(f, "center"),
            Position::Right => write!(f, "right"),
        }
    }
}

/// Identifies one combatant: a hero, or one of a hero's creatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatantKey {
    /// Absolute side owning the combatant.
    pub side: AbsoluteSide,
    /// Hero slot.
    pub position: Position,
    /// Index in the hero's creature list; `None` for the hero itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creature: Option<usize>,
}

impl CombatantKey {
    /// Key for a hero.
    #[must_use]
    pub const fn hero(side: AbsoluteSide, position: Position) -> Self {
        Self {
            side,
            position,
            creature: None,
        }
    }

    /// Key for a creature belonging to the hero at `(side, position)`.
    #[must_use]
    pub const fn creature_of(side: AbsoluteSide, position: Position, index: usize) -> Self {
        Self {
            side,
            position,
            creature: Some(index),
        }
    }

    /// Key for creature `index` of this key's hero.
    #[must_use]
    pub const fn creature(self, index: usize) -> Self {
        Self::creature_of(self.side, self.position, index)
    }

    /// Key of the hero owning this combatant (itself for heroes).
    #[must_use]
    pub const fn hero_key(self) -> Self {
        Self::hero(self.side, self.position)
    }

    /// Is this key a hero?
    #[must_use]
    pub const fn is_hero(self) -> bool {
        self.creature.is_none()
    }
}

impl std::fmt::Display for CombatantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.creature {
            Some(index) => write!(f, "{}/{}#{}", self.side, self.position, index),
            None => write!(f, "{}/{}", self.side, self.position),
        }
    }
}
