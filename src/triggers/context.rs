//! Trigger context: the ephemeral description of one resolution event.

use serde::{Deserialize, Serialize};

use crate::core::CombatantKey;

use super::kind::TriggerKind;

/// Origin of a damage amount.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageKind {
    /// Attack damage; shield absorbs it first.
    #[default]
    Normal,
    /// Damage from a status tick; bypasses shield.
    Status,
}

/// Context handed to every handler consulted for one trigger.
///
/// The registry updates `damage` between pre-damage handlers, so each sees
/// the value produced by the ones before it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectContext {
    pub trigger: TriggerKind,
    pub round: u32,
    /// The acting combatant (attacker, or the creature about to act).
    pub actor: Option<CombatantKey>,
    /// The combatant being hit, dying or killed.
    pub target: Option<CombatantKey>,
    pub damage: u32,
    pub damage_kind: DamageKind,
    /// Did the target survive the hit (after would-die handlers)?
    pub target_survived: bool,
    /// The damage was redirected by a rescue and may not be rescued again.
    pub redirected: bool,
}

impl EffectContext {
    /// Create a context with no participants.
    #[must_use]
    pub fn new(trigger: TriggerKind, round: u32) -> Self {
        Self {
            trigger,
            round,
            actor: None,
            target: None,
            damage: 0,
            damage_kind: DamageKind::Normal,
            target_survived: true,
            redirected: false,
        }
    }

    /// Set the actor (builder pattern).
    #[must_use]
    pub fn with_actor(mut self, actor: CombatantKey) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Set the target (builder pattern).
    #[must_use]
    pub fn with_target(mut self, target: CombatantKey) -> Self {
        self.target = Some(target);
        self
    }

    /// Set damage and its kind (builder pattern).
    #[must_use]
    pub fn with_damage(mut self, damage: u32, kind: DamageKind) -> Self {
        self.damage = damage;
        self.damage_kind = kind;
        self
    }

    /// Same participants, different trigger.
    #[must_use]
    pub fn retrigger(&self, trigger: TriggerKind) -> Self {
        Self {
            trigger,
            ..self.clone()
        }
    }
}
