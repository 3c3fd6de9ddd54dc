//! Attacker-side handlers: damage rewrites, on-hit statuses, kill payouts.

use serde::{Deserialize, Serialize};

use crate::battle::{BattleState, REWARD_PREFIX};
use crate::combatant::StatusKind;
use crate::core::{BattleRng, HandlerError};
use crate::triggers::{
    additive_bonus, combined_chance, independent_rolls, multiplicative_bonus, Activation, Control,
    EffectContext, EffectHandler, HandlerOrigin, HandlerSummary, TriggerKind,
};

use super::{decode, encode, lookup, lookup_mut, required, MOMENTUM};

/// Ability: chance to double attack damage.
///
/// Chance is `10% × level`, scaled multiplicatively by 25% per point of
/// momentum.
#[derive(Debug, Default)]
pub struct CriticalStrike;

impl CriticalStrike {
    pub const ID: &'static str = "critical_strike";
    pub const CARD: &'static str = "Critical Strike";

    pub fn new() -> Self {
        Self
    }

    fn chance(level: u32, momentum: u32) -> f64 {
        multiplicative_bonus(0.1 * f64::from(level), 0.25, momentum)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Crit {
    damage: u32,
}

impl EffectHandler for CriticalStrike {
    fn id(&self) -> &str {
        Self::ID
    }

    fn origin(&self) -> HandlerOrigin {
        HandlerOrigin::Ability
    }

    fn triggers(&self) -> &[TriggerKind] {
        &[TriggerKind::PreDamage]
    }

    fn applies_to(&self, state: &BattleState, ctx: &EffectContext) -> bool {
        ctx.damage > 0
            && ctx
                .actor
                .and_then(|k| state.get(k))
                .is_some_and(|c| c.ability_level(Self::CARD) > 0)
    }

    fn evaluate(
        &self,
        state: &BattleState,
        ctx: &EffectContext,
        rng: &mut BattleRng,
    ) -> Result<Option<Activation>, HandlerError> {
        let actor = lookup(state, required(ctx.actor, "attacker")?)?;
        let chance = Self::chance(actor.ability_level(Self::CARD), actor.statuses.counter(MOMENTUM));
        if !rng.roll(chance) {
            return Ok(None);
        }
        let crit = Crit {
            damage: ctx.damage.saturating_mul(2),
        };
        Ok(Some(Activation::new(ctx.actor, ctx.target).with_data(encode(&crit)?)))
    }

    fn apply(&mut self, _state: &mut BattleState, activation: Activation) -> Result<HandlerSummary, HandlerError> {
        let crit: Crit = decode(&activation.data)?;
        Ok(HandlerSummary::from_activation(Self::ID, &activation)
            .with_data(activation.data.clone())
            .with_control(Control::SetDamage { damage: crit.damage }))
    }

    // The damage itself arrives in `attack_resolved`.
    fn replay(&mut self, _state: &mut BattleState, summary: &HandlerSummary) -> Result<(), HandlerError> {
        summary.decode::<Crit>().map(|_| ())
    }
}

/// Equipment: each copy independently poisons a surviving target.
#[derive(Debug, Default)]
pub struct VenomFang;

impl VenomFang {
    pub const ID: &'static str = "venom_fang";
    pub const CARD: &'static str = "Venom Fang";
    pub const CHANCE: f64 = 0.3;

    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envenom {
    added: u32,
    /// Poison stacks on the target afterwards.
    #[serde(default)]
    total: u32,
}

impl EffectHandler for VenomFang {
    fn id(&self) -> &str {
        Self::ID
    }

    fn origin(&self) -> HandlerOrigin {
        HandlerOrigin::Equipment
    }

    fn triggers(&self) -> &[TriggerKind] {
        &[TriggerKind::OnAttackHit]
    }

    fn applies_to(&self, state: &BattleState, ctx: &EffectContext) -> bool {
        let armed = ctx
            .actor
            .and_then(|k| state.get(k))
            .is_some_and(|c| c.equipment_copies(Self::CARD) > 0);
        let exposed = ctx
            .target
            .and_then(|k| state.get(k))
            .is_some_and(|c| c.is_alive() && !c.statuses.is_immune(StatusKind::Poison));
        armed && ctx.target_survived && exposed
    }

    fn evaluate(
        &self,
        state: &BattleState,
        ctx: &EffectContext,
        rng: &mut BattleRng,
    ) -> Result<Option<Activation>, HandlerError> {
        let copies = lookup(state, required(ctx.actor, "attacker")?)?.equipment_copies(Self::CARD);
        let added = independent_rolls(rng, Self::CHANCE, copies);
        if added == 0 {
            return Ok(None);
        }
        let data = encode(&Envenom { added, total: 0 })?;
        Ok(Some(Activation::new(ctx.actor, ctx.target).with_data(data)))
    }

    fn apply(&mut self, state: &mut BattleState, activation: Activation) -> Result<HandlerSummary, HandlerError> {
        let Envenom { added, .. } = decode(&activation.data)?;
        let target = lookup_mut(state, required(activation.target, "target")?)?;
        target.statuses.add(StatusKind::Poison, added);
        let total = target.statuses.stacks(StatusKind::Poison);

        Ok(HandlerSummary::from_activation(Self::ID, &activation).with_data(encode(&Envenom { added, total })?))
    }

    fn replay(&mut self, state: &mut BattleState, summary: &HandlerSummary) -> Result<(), HandlerError> {
        let Envenom { total, .. } = summary.decode()?;
        let target = lookup_mut(state, required(summary.target, "target")?)?;
        target.statuses.set(StatusKind::Poison, total);
        Ok(())
    }
}

/// Spell: chance to freeze a surviving target for one round.
///
/// Chance is 20% plus 5% per point of the caster's momentum (additive,
/// unlike [`CriticalStrike`]).
#[derive(Debug, Default)]
pub struct FrostBolt;

impl FrostBolt {
    pub const ID: &'static str = "frost_bolt";
    pub const CARD: &'static str = "Frost Bolt";

    pub fn new() -> Self {
        Self
    }

    fn chance(momentum: u32) -> f64 {
        additive_bonus(0.2, 0.05, momentum)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Frozen {
    /// Caster's use count afterwards.
    uses: u32,
    /// Freeze stacks on the target afterwards.
    freeze: u32,
}

impl EffectHandler for FrostBolt {
    fn id(&self) -> &str {
        Self::ID
    }

    fn origin(&self) -> HandlerOrigin {
        HandlerOrigin::Spell
    }

    fn triggers(&self) -> &[TriggerKind] {
        &[TriggerKind::OnAttackHit]
    }

    fn applies_to(&self, state: &BattleState, ctx: &EffectContext) -> bool {
        let caster = ctx
            .actor
            .and_then(|k| state.get(k))
            .is_some_and(|c| c.knows_spell(Self::CARD));
        let target = ctx
            .target
            .and_then(|k| state.get(k))
            .is_some_and(|c| c.is_alive() && !c.statuses.is_immune(StatusKind::Freeze));
        caster && ctx.target_survived && target
    }

    fn evaluate(
        &self,
        state: &BattleState,
        ctx: &EffectContext,
        rng: &mut BattleRng,
    ) -> Result<Option<Activation>, HandlerError> {
        let caster = lookup(state, required(ctx.actor, "caster")?)?;
        if !rng.roll(Self::chance(caster.statuses.counter(MOMENTUM))) {
            return Ok(None);
        }
        Ok(Some(Activation::new(ctx.actor, ctx.target)))
    }

    fn apply(&mut self, state: &mut BattleState, activation: Activation) -> Result<HandlerSummary, HandlerError> {
        let uses = lookup_mut(state, required(activation.source, "caster")?)?
            .use_spell(Self::CARD)
            .ok_or(HandlerError::ResourceUnavailable("spell not in spellbook"))?;
        let target = lookup_mut(state, required(activation.target, "target")?)?;
        target.statuses.add(StatusKind::Freeze, 1);
        let freeze = target.statuses.stacks(StatusKind::Freeze);

        Ok(HandlerSummary::from_activation(Self::ID, &activation).with_data(encode(&Frozen { uses, freeze })?))
    }

    fn replay(&mut self, state: &mut BattleState, summary: &HandlerSummary) -> Result<(), HandlerError> {
        let Frozen { uses, freeze } = summary.decode()?;
        let caster = lookup_mut(state, required(summary.source, "caster")?)?;
        if !caster.set_spell_uses(Self::CARD, uses) {
            return Err(HandlerError::ResourceUnavailable("spell not in spellbook"));
        }
        lookup_mut(state, required(summary.target, "target")?)?
            .statuses
            .set(StatusKind::Freeze, freeze);
        Ok(())
    }
}

/// Equipment: on a kill, one roll at the combined chance of every copy
/// (20% each) pays out a gold reward to the killer.
#[derive(Debug, Default)]
pub struct BountyCharm;

impl BountyCharm {
    pub const ID: &'static str = "bounty_charm";
    pub const CARD: &'static str = "Bounty Charm";
    pub const CHANCE: f64 = 0.2;
    pub const GOLD: u32 = 5;

    pub fn new() -> Self {
        Self
    }

    /// Reward counter the payout lands in.
    pub fn counter() -> String {
        format!("{REWARD_PREFIX}gold")
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Bounty {
    gold: u32,
}

impl EffectHandler for BountyCharm {
    fn id(&self) -> &str {
        Self::ID
    }

    fn origin(&self) -> HandlerOrigin {
        HandlerOrigin::Equipment
    }

    fn triggers(&self) -> &[TriggerKind] {
        &[TriggerKind::OnKill]
    }

    fn applies_to(&self, state: &BattleState, ctx: &EffectContext) -> bool {
        ctx.actor
            .and_then(|k| state.get(k))
            .is_some_and(|c| c.equipment_copies(Self::CARD) > 0)
    }

    fn evaluate(
        &self,
        state: &BattleState,
        ctx: &EffectContext,
        rng: &mut BattleRng,
    ) -> Result<Option<Activation>, HandlerError> {
        let copies = lookup(state, required(ctx.actor, "killer")?)?.equipment_copies(Self::CARD);
        if !rng.roll(combined_chance(Self::CHANCE, copies)) {
            return Ok(None);
        }
        Ok(Some(Activation::new(ctx.actor, ctx.target)))
    }

    fn apply(&mut self, state: &mut BattleState, activation: Activation) -> Result<HandlerSummary, HandlerError> {
        let killer = lookup_mut(state, required(activation.source, "killer")?)?;
        let gold = killer.statuses.add_counter(&Self::counter(), Self::GOLD);
        Ok(HandlerSummary::from_activation(Self::ID, &activation).with_data(encode(&Bounty { gold })?))
    }

    fn replay(&mut self, state: &mut BattleState, summary: &HandlerSummary) -> Result<(), HandlerError> {
        let Bounty { gold } = summary.decode()?;
        lookup_mut(state, required(summary.source, "killer")?)?
            .statuses
            .set_counter(&Self::counter(), gold);
        Ok(())
    }
}
