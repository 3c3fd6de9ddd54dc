//! Typed payloads for every core message kind.
//!
//! Payloads carry absolute post-state (`newHp`, `newShield`, remaining
//! stacks) rather than deltas, so applying one twice is harmless and the
//! guest never has to recompute anything.

use serde::{Deserialize, Serialize};

use crate::combatant::StatusKind;
use crate::core::{AbsoluteSide, CombatantKey};
use crate::triggers::{HandlerSummary, TriggerKind};

use super::message::Payload;

/// The battle has started.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleStarted {
    pub max_rounds: u32,
}

impl Payload for BattleStarted {
    const KIND: &'static str = "battle_started";
}

/// A new round has begun; per-round trackers were reset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStarted {
    pub round: u32,
}

impl Payload for RoundStarted {
    const KIND: &'static str = "round_started";
}

/// An actor begins its turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnStarted {
    pub round: u32,
    pub turn: u32,
    pub actor: CombatantKey,
}

impl Payload for TurnStarted {
    const KIND: &'static str = "turn_started";
}

/// Why an actor did not act.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The key names no combatant.
    Missing,
    /// The actor is dead.
    Dead,
    /// A disabling status (freeze, stun) is active.
    Disabled,
    /// No enemy is alive to attack.
    NoTarget,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Missing => write!(f, "missing"),
            SkipReason::Dead => write!(f, "dead"),
            SkipReason::Disabled => write!(f, "disabled"),
            SkipReason::NoTarget => write!(f, "no target"),
        }
    }
}

/// An actor's turn was skipped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnSkipped {
    pub round: u32,
    pub turn: u32,
    pub actor: CombatantKey,
    pub reason: SkipReason,
}

impl Payload for TurnSkipped {
    const KIND: &'static str = "turn_skipped";
}

/// An attack landed on its target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackResolved {
    pub attacker: CombatantKey,
    pub target: CombatantKey,
    /// Damage after pre-damage handlers.
    pub damage: u32,
    /// Portion absorbed by shield.
    pub absorbed: u32,
    pub new_hp: u32,
    pub new_shield: u32,
}

impl Payload for AttackResolved {
    const KIND: &'static str = "attack_resolved";
}

/// A handler activated on the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerActivated {
    pub trigger: TriggerKind,
    pub summary: HandlerSummary,
}

impl Payload for HandlerActivated {
    const KIND: &'static str = "handler_activated";
}

/// Lethal damage moved from its original target onto a rescuer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageRedirected {
    pub from: CombatantKey,
    pub to: CombatantKey,
    pub damage: u32,
    /// Original target's restored vitals.
    pub from_hp: u32,
    pub from_shield: u32,
    /// Rescuer's vitals after absorbing the hit.
    pub new_hp: u32,
    pub new_shield: u32,
}

impl Payload for DamageRedirected {
    const KIND: &'static str = "damage_redirected";
}

/// A combatant was finalized as dead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatantDied {
    pub key: CombatantKey,
    /// Who dealt the killing blow, if anyone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub killer: Option<CombatantKey>,
}

impl Payload for CombatantDied {
    const KIND: &'static str = "combatant_died";
}

/// A status ticked at round end.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTicked {
    pub key: CombatantKey,
    pub status: StatusKind,
    pub damage: u32,
    pub remaining: u32,
    pub new_hp: u32,
}

impl Payload for StatusTicked {
    const KIND: &'static str = "status_ticked";
}

/// The end-of-round tick finished.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundEnded {
    pub round: u32,
}

impl Payload for RoundEnded {
    const KIND: &'static str = "round_ended";
}

/// How the battle ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Every combatant on one side is dead.
    Defeat,
    /// A side conceded.
    Surrender,
    /// The round cap was reached.
    RoundCap,
    /// The battle was torn down before a result.
    Aborted,
}

/// The battle is over. No further messages follow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleEnded {
    pub winner: Option<AbsoluteSide>,
    pub reason: EndReason,
    pub round: u32,
}

impl Payload for BattleEnded {
    const KIND: &'static str = "battle_ended";
}

/// Every message kind the guest understands.
pub const CORE_KINDS: [&str; 11] = [
    BattleStarted::KIND,
    RoundStarted::KIND,
    TurnStarted::KIND,
    TurnSkipped::KIND,
    AttackResolved::KIND,
    HandlerActivated::KIND,
    DamageRedirected::KIND,
    CombatantDied::KIND,
    StatusTicked::KIND,
    RoundEnded::KIND,
    BattleEnded::KIND,
];
