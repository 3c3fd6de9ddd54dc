//! Trigger kinds and handler ordering keys.

use serde::{Deserialize, Serialize};

/// Points in the battle where handlers are consulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Before attack damage is applied; handlers may rewrite the amount.
    PreDamage,
    /// After an attack landed (target may or may not have survived).
    OnAttackHit,
    /// After a combatant took attack damage.
    OnDamageTaken,
    /// HP reached zero; rescue and revival handlers may consume the death.
    WouldDie,
    /// The actor's attack killed its target.
    OnKill,
    /// Once, when the battle starts.
    OnBattleStart,
    /// At the start of every round, after per-round trackers reset.
    OnRoundStart,
    /// A creature is about to act; a handler may replace its attack.
    CreatureAction,
}

impl TriggerKind {
    /// All trigger kinds.
    pub const ALL: [TriggerKind; 8] = [
        TriggerKind::PreDamage,
        TriggerKind::OnAttackHit,
        TriggerKind::OnDamageTaken,
        TriggerKind::WouldDie,
        TriggerKind::OnKill,
        TriggerKind::OnBattleStart,
        TriggerKind::OnRoundStart,
        TriggerKind::CreatureAction,
    ];

    /// Does the first consuming handler end the invocation?
    #[must_use]
    pub const fn is_exclusive(self) -> bool {
        matches!(self, TriggerKind::WouldDie | TriggerKind::CreatureAction)
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TriggerKind::PreDamage => "pre_damage",
            TriggerKind::OnAttackHit => "on_attack_hit",
            TriggerKind::OnDamageTaken => "on_damage_taken",
            TriggerKind::WouldDie => "would_die",
            TriggerKind::OnKill => "on_kill",
            TriggerKind::OnBattleStart => "on_battle_start",
            TriggerKind::OnRoundStart => "on_round_start",
            TriggerKind::CreatureAction => "creature_action",
        };
        f.write_str(name)
    }
}

/// Where a handler comes from. Per trigger kind, handlers run in this
/// order: equipment, spells, abilities, creatures, potions, and status
/// effects last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerOrigin {
    Equipment,
    Spell,
    Ability,
    Creature,
    Potion,
    Status,
}

/// Consultation order among would-die handlers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathPriority {
    /// Redirect the damage to another combatant.
    Rescue,
    /// Restore the dying combatant.
    #[default]
    Revival,
}
