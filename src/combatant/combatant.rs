//! Combatants: heroes and their creatures.
//!
//! A `Combatant` tracks vital stats, equipment, spellbook, status stacks and
//! free-form custom stats. HP always stays within `[0, max_hp]`; shield is
//! never negative (both are unsigned and every mutation clamps).

use im::OrdMap;
use serde::{Deserialize, Serialize};

use super::status::StatusSet;

/// One equipped artifact, normalised once at roster load time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Equipment {
    /// Card name; the key handlers match on.
    pub name: String,
}

impl Equipment {
    /// Create an equipment entry.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A known spell with its per-battle usage counter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpellEntry {
    pub name: String,
    #[serde(default)]
    pub uses_this_battle: u32,
}

impl SpellEntry {
    /// Create an unused spell entry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uses_this_battle: 0,
        }
    }
}

/// Result of applying damage to a combatant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageOutcome {
    /// Damage soaked by shield.
    pub absorbed: u32,
    /// HP actually lost.
    pub hp_lost: u32,
    /// HP after the hit.
    pub new_hp: u32,
    /// Shield after the hit.
    pub new_shield: u32,
    /// Did the hit reduce HP to zero?
    pub lethal: bool,
}

/// A hero or creature taking part in the battle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combatant {
    pub name: String,
    pub current_hp: u32,
    pub max_hp: u32,
    #[serde(default)]
    pub current_shield: u32,
    pub base_attack: u32,
    /// Additive attack modifier from effects.
    #[serde(default)]
    pub attack_bonus: i32,
    pub alive: bool,
    #[serde(default)]
    pub equipment: Vec<Equipment>,
    #[serde(default)]
    pub spellbook: Vec<SpellEntry>,
    /// Ability names with their levels (heroes only, in practice).
    #[serde(default)]
    pub abilities: OrdMap<String, u32>,
    #[serde(default)]
    pub statuses: StatusSet,
    /// Per-combatant flags for handlers (booleans as 0/1).
    #[serde(default)]
    pub custom_stats: OrdMap<String, i64>,
}

impl Combatant {
    /// Create a living combatant at full HP.
    pub fn new(name: impl Into<String>, max_hp: u32, base_attack: u32) -> Self {
        Self {
            name: name.into(),
            current_hp: max_hp,
            max_hp,
            current_shield: 0,
            base_attack,
            attack_bonus: 0,
            alive: max_hp > 0,
            equipment: Vec::new(),
            spellbook: Vec::new(),
            abilities: OrdMap::new(),
            statuses: StatusSet::new(),
            custom_stats: OrdMap::new(),
        }
    }

    /// Add an equipment entry (builder pattern).
    #[must_use]
    pub fn with_equipment(mut self, name: impl Into<String>) -> Self {
        self.equipment.push(Equipment::new(name));
        self
    }

    /// Add a known spell (builder pattern).
    #[must_use]
    pub fn with_spell(mut self, name: impl Into<String>) -> Self {
        self.spellbook.push(SpellEntry::new(name));
        self
    }

    /// Add an ability at a level (builder pattern).
    #[must_use]
    pub fn with_ability(mut self, name: impl Into<String>, level: u32) -> Self {
        self.abilities.insert(name.into(), level);
        self
    }

    /// Set starting shield (builder pattern).
    #[must_use]
    pub fn with_shield(mut self, shield: u32) -> Self {
        self.current_shield = shield;
        self
    }

    /// Replace the status set (builder pattern), e.g. to add immunities.
    #[must_use]
    pub fn with_statuses(mut self, statuses: StatusSet) -> Self {
        self.statuses = statuses;
        self
    }

    // === Stats ===

    /// Attack after modifiers, never negative.
    #[must_use]
    pub fn attack(&self) -> u32 {
        let modified = i64::from(self.base_attack) + i64::from(self.attack_bonus);
        modified.clamp(0, i64::from(u32::MAX)) as u32
    }

    /// Number of equipped copies of `name`.
    #[must_use]
    pub fn equipment_copies(&self, name: &str) -> u32 {
        self.equipment.iter().filter(|e| e.name == name).count() as u32
    }

    /// Ability level, 0 when absent.
    #[must_use]
    pub fn ability_level(&self, name: &str) -> u32 {
        self.abilities.get(name).copied().unwrap_or(0)
    }

    /// Does the spellbook contain `name`?
    #[must_use]
    pub fn knows_spell(&self, name: &str) -> bool {
        self.spellbook.iter().any(|s| s.name == name)
    }

    /// Record one use of a spell. Returns the new use count, or `None` if
    /// the spell is unknown.
    pub fn use_spell(&mut self, name: &str) -> Option<u32> {
        let entry = self.spellbook.iter_mut().find(|s| s.name == name)?;
        entry.uses_this_battle += 1;
        Some(entry.uses_this_battle)
    }

    /// Set a spell's use count to an absolute value (used by replay).
    /// Returns `false` if the spell is unknown.
    pub fn set_spell_uses(&mut self, name: &str, uses: u32) -> bool {
        match self.spellbook.iter_mut().find(|s| s.name == name) {
            Some(entry) => {
                entry.uses_this_battle = uses;
                true
            }
            None => false,
        }
    }

    /// Uses of a spell this battle (0 when unknown).
    #[must_use]
    pub fn spell_uses(&self, name: &str) -> u32 {
        self.spellbook
            .iter()
            .find(|s| s.name == name)
            .map_or(0, |s| s.uses_this_battle)
    }

    // === Custom stats ===

    /// Get a custom stat with a default.
    #[must_use]
    pub fn custom_stat(&self, key: &str, default: i64) -> i64 {
        self.custom_stats.get(key).copied().unwrap_or(default)
    }

    /// Set a custom stat.
    pub fn set_custom_stat(&mut self, key: impl Into<String>, value: i64) {
        self.custom_stats.insert(key.into(), value);
    }

    /// Is a boolean custom flag set?
    #[must_use]
    pub fn has_flag(&self, key: &str) -> bool {
        self.custom_stat(key, 0) != 0
    }

    // === Vitals ===

    /// Apply attack damage: shield absorbs first, the rest reduces HP,
    /// clamped at 0. Does not change `alive`; the pipeline decides that
    /// after consulting would-die handlers.
    pub fn take_damage(&mut self, amount: u32) -> DamageOutcome {
        let absorbed = amount.min(self.current_shield);
        self.current_shield -= absorbed;
        self.lose_hp(amount - absorbed, absorbed)
    }

    /// Reduce HP directly, bypassing shield (status damage, reflection).
    pub fn take_direct_damage(&mut self, amount: u32) -> DamageOutcome {
        self.lose_hp(amount, 0)
    }

    fn lose_hp(&mut self, amount: u32, absorbed: u32) -> DamageOutcome {
        let hp_lost = amount.min(self.current_hp);
        self.current_hp -= hp_lost;
        DamageOutcome {
            absorbed,
            hp_lost,
            new_hp: self.current_hp,
            new_shield: self.current_shield,
            lethal: self.current_hp == 0 && (hp_lost > 0 || amount > 0),
        }
    }

    /// Set HP to an absolute value, clamped to `[0, max_hp]`.
    pub fn apply_hp(&mut self, hp: u32) {
        self.current_hp = hp.min(self.max_hp);
    }

    /// Set shield to an absolute value.
    pub fn apply_shield(&mut self, shield: u32) {
        self.current_shield = shield;
    }

    /// Restore HP without exceeding `max_hp`. Returns HP gained.
    pub fn heal(&mut self, amount: u32) -> u32 {
        if !self.alive {
            return 0;
        }
        let gained = amount.min(self.max_hp.saturating_sub(self.current_hp));
        self.current_hp += gained;
        gained
    }

    /// Add shield.
    pub fn add_shield(&mut self, amount: u32) {
        self.current_shield = self.current_shield.saturating_add(amount);
    }

    /// Bring back to life at `hp` (at least 1, at most `max_hp`).
    pub fn revive(&mut self, hp: u32) {
        self.current_hp = hp.clamp(1, self.max_hp.max(1));
        self.alive = true;
    }

    /// Mark dead: HP 0, statuses cleared.
    pub fn finalize_death(&mut self) {
        self.current_hp = 0;
        self.alive = false;
        self.statuses.clear();
    }

    /// Can this combatant be targeted or act?
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive && self.current_hp > 0
    }
}
