//! Support handlers: rewards, round-start buffs, creature actions.

use serde::{Deserialize, Serialize};

use crate::battle::{BattleState, REWARD_PREFIX};
use crate::core::{BattleRng, CombatantKey, HandlerError};
use crate::triggers::{
    Activation, Control, EffectContext, EffectHandler, HandlerOrigin, HandlerSummary, TriggerKind,
};

use super::{decode, encode, living_where, lookup, lookup_mut, required, Grant, MOMENTUM};

/// Equipment: one bonus card reward per copy, granted at battle start.
#[derive(Debug, Default)]
pub struct SupplyChain;

impl SupplyChain {
    pub const ID: &'static str = "supply_chain";
    pub const CARD: &'static str = "Supply Chain";

    pub fn new() -> Self {
        Self
    }

    /// Reward counter the cards land in.
    pub fn counter() -> String {
        format!("{REWARD_PREFIX}cards")
    }
}

impl EffectHandler for SupplyChain {
    fn id(&self) -> &str {
        Self::ID
    }

    fn origin(&self) -> HandlerOrigin {
        HandlerOrigin::Equipment
    }

    fn triggers(&self) -> &[TriggerKind] {
        &[TriggerKind::OnBattleStart]
    }

    fn applies_to(&self, state: &BattleState, _ctx: &EffectContext) -> bool {
        !living_where(state, |c| c.equipment_copies(Self::CARD) > 0).is_empty()
    }

    fn evaluate(
        &self,
        state: &BattleState,
        _ctx: &EffectContext,
        _rng: &mut BattleRng,
    ) -> Result<Option<Activation>, HandlerError> {
        let bearers = living_where(state, |c| c.equipment_copies(Self::CARD) > 0);
        Ok(Some(Activation::new(None, None).with_data(encode(&bearers)?)))
    }

    fn apply(&mut self, state: &mut BattleState, activation: Activation) -> Result<HandlerSummary, HandlerError> {
        let bearers: Vec<CombatantKey> = decode(&activation.data)?;
        let counter = Self::counter();
        let mut grants = Vec::with_capacity(bearers.len());
        for key in bearers {
            let bearer = lookup_mut(state, key)?;
            let copies = bearer.equipment_copies(Self::CARD);
            let value = bearer.statuses.add_counter(&counter, copies);
            grants.push(Grant { key, value });
        }
        Ok(HandlerSummary::from_activation(Self::ID, &activation).with_data(encode(&grants)?))
    }

    fn replay(&mut self, state: &mut BattleState, summary: &HandlerSummary) -> Result<(), HandlerError> {
        let grants: Vec<Grant> = summary.decode()?;
        for grant in &grants {
            lookup(state, grant.key)?;
        }
        let counter = Self::counter();
        for grant in grants {
            lookup_mut(state, grant.key)?.statuses.set_counter(&counter, grant.value);
        }
        Ok(())
    }
}

/// Equipment: every round start, bearers gain one momentum and two attack
/// per copy.
#[derive(Debug, Default)]
pub struct WarDrum;

impl WarDrum {
    pub const ID: &'static str = "war_drum";
    pub const CARD: &'static str = "War Drum";
    pub const ATTACK_PER_BEAT: i32 = 2;

    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Beat {
    key: CombatantKey,
    momentum: u32,
    attack_bonus: i32,
}

impl EffectHandler for WarDrum {
    fn id(&self) -> &str {
        Self::ID
    }

    fn origin(&self) -> HandlerOrigin {
        HandlerOrigin::Equipment
    }

    fn triggers(&self) -> &[TriggerKind] {
        &[TriggerKind::OnRoundStart]
    }

    fn applies_to(&self, state: &BattleState, _ctx: &EffectContext) -> bool {
        !living_where(state, |c| c.equipment_copies(Self::CARD) > 0).is_empty()
    }

    fn evaluate(
        &self,
        state: &BattleState,
        _ctx: &EffectContext,
        _rng: &mut BattleRng,
    ) -> Result<Option<Activation>, HandlerError> {
        let bearers = living_where(state, |c| c.equipment_copies(Self::CARD) > 0);
        Ok(Some(Activation::new(None, None).with_data(encode(&bearers)?)))
    }

    fn apply(&mut self, state: &mut BattleState, activation: Activation) -> Result<HandlerSummary, HandlerError> {
        let bearers: Vec<CombatantKey> = decode(&activation.data)?;
        let mut beats = Vec::with_capacity(bearers.len());
        for key in bearers {
            let bearer = lookup_mut(state, key)?;
            let copies = bearer.equipment_copies(Self::CARD);
            let momentum = bearer.statuses.add_counter(MOMENTUM, copies);
            let gain = i32::try_from(copies).unwrap_or(i32::MAX).saturating_mul(Self::ATTACK_PER_BEAT);
            bearer.attack_bonus = bearer.attack_bonus.saturating_add(gain);
            beats.push(Beat {
                key,
                momentum,
                attack_bonus: bearer.attack_bonus,
            });
        }
        Ok(HandlerSummary::from_activation(Self::ID, &activation).with_data(encode(&beats)?))
    }

    fn replay(&mut self, state: &mut BattleState, summary: &HandlerSummary) -> Result<(), HandlerError> {
        let beats: Vec<Beat> = summary.decode()?;
        for beat in &beats {
            lookup(state, beat.key)?;
        }
        for beat in beats {
            let bearer = lookup_mut(state, beat.key)?;
            bearer.statuses.set_counter(MOMENTUM, beat.momentum);
            bearer.attack_bonus = beat.attack_bonus;
        }
        Ok(())
    }
}

/// Creature: instead of attacking, heals the most wounded living ally by
/// its attack value. Attacks normally when nobody is hurt.
#[derive(Debug, Default)]
pub struct MendingSprite;

impl MendingSprite {
    pub const ID: &'static str = "mending_sprite";
    pub const CARD: &'static str = "Mending Sprite";

    pub fn new() -> Self {
        Self
    }

    /// Living ally missing the most HP; earliest in turn order on ties.
    fn patient(state: &BattleState, healer: CombatantKey) -> Option<CombatantKey> {
        let mut best: Option<(CombatantKey, u32)> = None;
        for key in state.alive_keys(healer.side) {
            let Some(c) = state.get(key) else { continue };
            let missing = c.max_hp.saturating_sub(c.current_hp);
            if missing > 0 && best.map_or(true, |(_, m)| missing > m) {
                best = Some((key, missing));
            }
        }
        best.map(|(key, _)| key)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Mend {
    healed: u32,
    #[serde(default)]
    new_hp: u32,
}

impl EffectHandler for MendingSprite {
    fn id(&self) -> &str {
        Self::ID
    }

    fn origin(&self) -> HandlerOrigin {
        HandlerOrigin::Creature
    }

    fn triggers(&self) -> &[TriggerKind] {
        &[TriggerKind::CreatureAction]
    }

    fn applies_to(&self, state: &BattleState, ctx: &EffectContext) -> bool {
        ctx.actor.is_some_and(|actor| {
            state.get(actor).is_some_and(|c| c.name == Self::CARD)
                && Self::patient(state, actor).is_some()
        })
    }

    fn evaluate(
        &self,
        state: &BattleState,
        ctx: &EffectContext,
        _rng: &mut BattleRng,
    ) -> Result<Option<Activation>, HandlerError> {
        let healer = required(ctx.actor, "healer")?;
        let Some(patient) = Self::patient(state, healer) else {
            return Ok(None);
        };
        let healed = lookup(state, healer)?.attack().max(1);
        let data = encode(&Mend { healed, new_hp: 0 })?;
        Ok(Some(Activation::new(Some(healer), Some(patient)).with_data(data)))
    }

    fn apply(&mut self, state: &mut BattleState, activation: Activation) -> Result<HandlerSummary, HandlerError> {
        let Mend { healed, .. } = decode(&activation.data)?;
        let patient = lookup_mut(state, required(activation.target, "patient")?)?;
        let healed = patient.heal(healed);

        let data = encode(&Mend {
            healed,
            new_hp: patient.current_hp,
        })?;
        Ok(HandlerSummary::from_activation(Self::ID, &activation)
            .with_data(data)
            .with_control(Control::TakeAction))
    }

    fn replay(&mut self, state: &mut BattleState, summary: &HandlerSummary) -> Result<(), HandlerError> {
        let Mend { new_hp, .. } = summary.decode()?;
        lookup_mut(state, required(summary.target, "patient")?)?.apply_hp(new_hp);
        Ok(())
    }
}
