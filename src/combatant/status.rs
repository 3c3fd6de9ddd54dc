//! Stacking status conditions and named counters.
//!
//! Stacks are added by handlers, ticked once per round by the scheduler and
//! never go negative. Adding a status a combatant is immune to is a no-op.
//! Shield lives on the combatant itself (it never expires and is consumed by
//! the pipeline before HP).

use im::{OrdMap, OrdSet};
use serde::{Deserialize, Serialize};

/// A stacking status condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// Damage every round, persists.
    Poison,
    /// Heavier damage every round, persists.
    Burn,
    /// Skips turns; one stack thaws per round.
    Freeze,
    /// Skips turns; cleared at round end.
    Stun,
}

impl StatusKind {
    /// All status kinds in tick order.
    pub const ALL: [StatusKind; 4] = [
        StatusKind::Poison,
        StatusKind::Burn,
        StatusKind::Freeze,
        StatusKind::Stun,
    ];

    /// Does this status prevent its bearer from acting?
    #[must_use]
    pub const fn disables(self) -> bool {
        matches!(self, StatusKind::Freeze | StatusKind::Stun)
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StatusKind::Poison => "poison",
            StatusKind::Burn => "burn",
            StatusKind::Freeze => "freeze",
            StatusKind::Stun => "stun",
        };
        f.write_str(name)
    }
}

/// How stacks decay at the end-of-round tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decay {
    /// Stacks persist until removed by an effect.
    Persist,
    /// One stack is removed per tick.
    One,
    /// All stacks are removed at the tick.
    All,
}

/// Tick rule for one status kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRule {
    /// HP lost per stack at each tick (bypasses shield).
    pub damage_per_stack: u32,
    /// Decay applied after damage.
    pub decay: Decay,
}

/// Tick rules for every status kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusRules {
    pub poison: StatusRule,
    pub burn: StatusRule,
    pub freeze: StatusRule,
    pub stun: StatusRule,
}

impl Default for StatusRules {
    fn default() -> Self {
        Self {
            poison: StatusRule {
                damage_per_stack: 30,
                decay: Decay::Persist,
            },
            burn: StatusRule {
                damage_per_stack: 60,
                decay: Decay::Persist,
            },
            freeze: StatusRule {
                damage_per_stack: 0,
                decay: Decay::One,
            },
            stun: StatusRule {
                damage_per_stack: 0,
                decay: Decay::All,
            },
        }
    }
}

impl StatusRules {
    /// Rule for a status kind.
    #[must_use]
    pub fn rule(&self, kind: StatusKind) -> StatusRule {
        match kind {
            StatusKind::Poison => self.poison,
            StatusKind::Burn => self.burn,
            StatusKind::Freeze => self.freeze,
            StatusKind::Stun => self.stun,
        }
    }
}

/// Result of ticking one status kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTick {
    pub kind: StatusKind,
    /// Damage to deal to the bearer.
    pub damage: u32,
    /// Stacks left after decay.
    pub remaining: u32,
}

/// Status stacks, immunities and named counters of one combatant.
///
/// Backed by `im` ordered maps: clones are O(1) and iteration order is
/// deterministic, so host and guest serialise identically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSet {
    stacks: OrdMap<StatusKind, u32>,
    immune: OrdSet<StatusKind>,
    counters: OrdMap<String, u32>,
}

impl StatusSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with immunities (e.g. constructs immune to poison/burn/freeze).
    pub fn with_immunities(kinds: impl IntoIterator<Item = StatusKind>) -> Self {
        Self {
            immune: kinds.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Is the bearer immune to `kind`?
    #[must_use]
    pub fn is_immune(&self, kind: StatusKind) -> bool {
        self.immune.contains(&kind)
    }

    /// Grant an immunity, clearing any existing stacks of that kind.
    pub fn grant_immunity(&mut self, kind: StatusKind) {
        self.immune.insert(kind);
        self.stacks.remove(&kind);
    }

    /// Current stacks of `kind`.
    #[must_use]
    pub fn stacks(&self, kind: StatusKind) -> u32 {
        self.stacks.get(&kind).copied().unwrap_or(0)
    }

    /// Add stacks. Returns the number actually added (0 when immune).
    pub fn add(&mut self, kind: StatusKind, amount: u32) -> u32 {
        if amount == 0 || self.is_immune(kind) {
            return 0;
        }
        let total = self.stacks(kind).saturating_add(amount);
        self.stacks.insert(kind, total);
        amount
    }

    /// Remove up to `amount` stacks. Returns the number removed.
    pub fn remove(&mut self, kind: StatusKind, amount: u32) -> u32 {
        let current = self.stacks(kind);
        let removed = current.min(amount);
        self.set(kind, current - removed);
        removed
    }

    /// Set stacks to an absolute value (used by replay). Ignores immunity
    /// only for zero, so a replay can never create an illegal stack.
    pub fn set(&mut self, kind: StatusKind, stacks: u32) {
        if stacks == 0 {
            self.stacks.remove(&kind);
        } else if !self.is_immune(kind) {
            self.stacks.insert(kind, stacks);
        }
    }

    /// Remove every stack of every kind.
    pub fn clear(&mut self) {
        self.stacks.clear();
    }

    /// Is any disabling status (freeze, stun) active?
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.stacks.iter().any(|(kind, &n)| kind.disables() && n > 0)
    }

    /// Active statuses in deterministic order.
    pub fn active(&self) -> impl Iterator<Item = (StatusKind, u32)> + '_ {
        self.stacks.iter().map(|(&k, &n)| (k, n))
    }

    /// Tick a single kind: compute its damage, then decay. Returns `None`
    /// when the kind has no stacks.
    pub fn tick_one(&mut self, kind: StatusKind, rules: &StatusRules) -> Option<StatusTick> {
        let stacks = self.stacks(kind);
        if stacks == 0 {
            return None;
        }

        let rule = rules.rule(kind);
        let remaining = match rule.decay {
            Decay::Persist => stacks,
            Decay::One => stacks.saturating_sub(1),
            Decay::All => 0,
        };
        self.set(kind, remaining);

        Some(StatusTick {
            kind,
            damage: rule.damage_per_stack.saturating_mul(stacks),
            remaining,
        })
    }

    /// Apply the end-of-round tick to every active kind.
    pub fn tick(&mut self, rules: &StatusRules) -> Vec<StatusTick> {
        StatusKind::ALL
            .into_iter()
            .filter_map(|kind| self.tick_one(kind, rules))
            .collect()
    }

    // === Counters ===

    /// Get a named counter (0 when absent).
    #[must_use]
    pub fn counter(&self, name: &str) -> u32 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Add to a named counter, saturating. Returns the new value.
    pub fn add_counter(&mut self, name: &str, amount: u32) -> u32 {
        let value = self.counter(name).saturating_add(amount);
        self.counters.insert(name.to_string(), value);
        value
    }

    /// Set a named counter to an absolute value.
    pub fn set_counter(&mut self, name: &str, value: u32) {
        if value == 0 {
            self.counters.remove(name);
        } else {
            self.counters.insert(name.to_string(), value);
        }
    }

    /// Iterate counters in name order.
    pub fn counters(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counters.iter().map(|(k, &v)| (k.as_str(), v))
    }
}
