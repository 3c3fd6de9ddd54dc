//! Defender-side handlers: reflection, rescue, revival, starting shields.

use im::OrdSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::battle::BattleState;
use crate::core::{BattleRng, CombatantKey, HandlerError};
use crate::triggers::{
    Activation, Control, DamageKind, DeathPriority, EffectContext, EffectHandler, HandlerOrigin,
    HandlerSummary, TriggerKind,
};

use super::{decode, encode, living_where, lookup, lookup_mut, required, Grant};

/// Equipment: reflects 10% of each hit per copy (at least 1) back at the
/// attacker. Reflection never kills.
#[derive(Debug, Default)]
pub struct ThornMail;

impl ThornMail {
    pub const ID: &'static str = "thorn_mail";
    pub const CARD: &'static str = "Thorn Mail";

    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reflection {
    damage: u32,
    #[serde(default)]
    new_hp: u32,
}

impl EffectHandler for ThornMail {
    fn id(&self) -> &str {
        Self::ID
    }

    fn origin(&self) -> HandlerOrigin {
        HandlerOrigin::Equipment
    }

    fn triggers(&self) -> &[TriggerKind] {
        &[TriggerKind::OnDamageTaken]
    }

    fn applies_to(&self, state: &BattleState, ctx: &EffectContext) -> bool {
        let (Some(bearer), Some(attacker)) = (ctx.target, ctx.actor) else {
            return false;
        };
        ctx.damage > 0
            && ctx.damage_kind == DamageKind::Normal
            && bearer != attacker
            && state
                .get(bearer)
                .is_some_and(|c| c.equipment_copies(Self::CARD) > 0)
            && state.get(attacker).is_some_and(|c| c.is_alive() && c.current_hp > 1)
    }

    fn evaluate(
        &self,
        state: &BattleState,
        ctx: &EffectContext,
        _rng: &mut BattleRng,
    ) -> Result<Option<Activation>, HandlerError> {
        let copies = lookup(state, required(ctx.target, "bearer")?)?.equipment_copies(Self::CARD);
        let attacker = lookup(state, required(ctx.actor, "attacker")?)?;

        let damage = (ctx.damage.saturating_mul(copies) / 10)
            .max(1)
            .min(attacker.current_hp.saturating_sub(1));
        if damage == 0 {
            return Ok(None);
        }
        let data = encode(&Reflection { damage, new_hp: 0 })?;
        Ok(Some(Activation::new(ctx.target, ctx.actor).with_data(data)))
    }

    fn apply(&mut self, state: &mut BattleState, activation: Activation) -> Result<HandlerSummary, HandlerError> {
        let Reflection { damage, .. } = decode(&activation.data)?;
        let attacker = lookup_mut(state, required(activation.target, "attacker")?)?;
        let hit = attacker.take_direct_damage(damage.min(attacker.current_hp.saturating_sub(1)));

        let data = encode(&Reflection {
            damage: hit.hp_lost,
            new_hp: hit.new_hp,
        })?;
        Ok(HandlerSummary::from_activation(Self::ID, &activation).with_data(data))
    }

    fn replay(&mut self, state: &mut BattleState, summary: &HandlerSummary) -> Result<(), HandlerError> {
        let Reflection { new_hp, .. } = summary.decode()?;
        lookup_mut(state, required(summary.target, "attacker")?)?.apply_hp(new_hp.max(1));
        Ok(())
    }
}

/// Ability: an allied hero steps in front of a killing blow, taking the
/// damage instead. Each guardian rescues once per round; when several are
/// able, one is picked at random.
///
/// Only plain attack damage is redirected, and never a hit that was itself
/// redirected.
#[derive(Debug, Default)]
pub struct Guardian {
    used: OrdSet<CombatantKey>,
}

impl Guardian {
    pub const ID: &'static str = "guardian";
    pub const CARD: &'static str = "Guardian";

    pub fn new() -> Self {
        Self::default()
    }

    /// Heroes that could rescue `target` right now, in position order.
    fn rescuers(&self, state: &BattleState, target: CombatantKey) -> Vec<CombatantKey> {
        state
            .allied_heroes(target.side, target)
            .filter(|k| !self.used.contains(k))
            .filter(|&k| state.get(k).is_some_and(|c| c.ability_level(Self::CARD) > 0))
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Rescue {
    rescuer: CombatantKey,
}

impl EffectHandler for Guardian {
    fn id(&self) -> &str {
        Self::ID
    }

    fn origin(&self) -> HandlerOrigin {
        HandlerOrigin::Ability
    }

    fn triggers(&self) -> &[TriggerKind] {
        &[TriggerKind::WouldDie]
    }

    fn death_priority(&self) -> DeathPriority {
        DeathPriority::Rescue
    }

    fn applies_to(&self, state: &BattleState, ctx: &EffectContext) -> bool {
        ctx.damage_kind == DamageKind::Normal
            && !ctx.redirected
            && ctx.target.is_some_and(|t| !self.rescuers(state, t).is_empty())
    }

    fn evaluate(
        &self,
        state: &BattleState,
        ctx: &EffectContext,
        rng: &mut BattleRng,
    ) -> Result<Option<Activation>, HandlerError> {
        let target = required(ctx.target, "dying combatant")?;
        let rescuers = self.rescuers(state, target);
        let pick = match rescuers.len() {
            0 => return Ok(None),
            1 => 0,
            n => rng.choose_index(n).unwrap_or(0),
        };
        let rescuer = rescuers[pick];
        Ok(Some(
            Activation::new(Some(rescuer), Some(target)).with_data(encode(&Rescue { rescuer })?),
        ))
    }

    fn apply(&mut self, _state: &mut BattleState, activation: Activation) -> Result<HandlerSummary, HandlerError> {
        let Rescue { rescuer } = decode(&activation.data)?;
        self.used.insert(rescuer);
        Ok(HandlerSummary::from_activation(Self::ID, &activation)
            .with_data(activation.data.clone())
            .with_control(Control::Redirect { to: rescuer }))
    }

    // Vitals travel in `damage_redirected`; only the round tracker moves here.
    fn replay(&mut self, _state: &mut BattleState, summary: &HandlerSummary) -> Result<(), HandlerError> {
        let Rescue { rescuer } = summary.decode()?;
        self.used.insert(rescuer);
        Ok(())
    }

    fn reset_round(&mut self) {
        self.used.clear();
    }

    fn export_state(&self) -> Option<Value> {
        serde_json::to_value(&self.used).ok()
    }

    fn import_state(&mut self, state: Option<&Value>) {
        self.used = match state.map(|v| serde_json::from_value(v.clone())) {
            Some(Ok(used)) => used,
            Some(Err(err)) => {
                warn!(handler = Self::ID, %err, "bad guardian state, resetting");
                OrdSet::new()
            }
            None => OrdSet::new(),
        };
    }

    fn teardown(&mut self) {
        self.used.clear();
    }
}

/// Equipment: once per battle, a combatant about to die comes back at half
/// HP instead.
#[derive(Debug, Default)]
pub struct PhoenixFeather;

impl PhoenixFeather {
    pub const ID: &'static str = "phoenix_feather";
    pub const CARD: &'static str = "Phoenix Feather";
    /// Custom flag marking the feather as spent.
    pub const SPENT: &'static str = "revived:phoenix_feather";

    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Revival {
    hp: u32,
}

impl EffectHandler for PhoenixFeather {
    fn id(&self) -> &str {
        Self::ID
    }

    fn origin(&self) -> HandlerOrigin {
        HandlerOrigin::Equipment
    }

    fn triggers(&self) -> &[TriggerKind] {
        &[TriggerKind::WouldDie]
    }

    fn applies_to(&self, state: &BattleState, ctx: &EffectContext) -> bool {
        ctx.target
            .and_then(|k| state.get(k))
            .is_some_and(|c| c.equipment_copies(Self::CARD) > 0 && !c.has_flag(Self::SPENT))
    }

    fn evaluate(
        &self,
        _state: &BattleState,
        ctx: &EffectContext,
        _rng: &mut BattleRng,
    ) -> Result<Option<Activation>, HandlerError> {
        Ok(Some(Activation::new(ctx.target, ctx.target)))
    }

    fn apply(&mut self, state: &mut BattleState, activation: Activation) -> Result<HandlerSummary, HandlerError> {
        let target = lookup_mut(state, required(activation.target, "dying combatant")?)?;
        target.revive(target.max_hp / 2);
        target.set_custom_stat(Self::SPENT, 1);

        let data = encode(&Revival { hp: target.current_hp })?;
        Ok(HandlerSummary::from_activation(Self::ID, &activation)
            .with_data(data)
            .with_control(Control::PreventDeath))
    }

    fn replay(&mut self, state: &mut BattleState, summary: &HandlerSummary) -> Result<(), HandlerError> {
        let Revival { hp } = summary.decode()?;
        let target = lookup_mut(state, required(summary.target, "dying combatant")?)?;
        target.revive(hp);
        target.set_custom_stat(Self::SPENT, 1);
        Ok(())
    }
}

/// Ability: shield of `20 × level` at battle start.
#[derive(Debug, Default)]
pub struct IronSkin;

impl IronSkin {
    pub const ID: &'static str = "iron_skin";
    pub const CARD: &'static str = "Iron Skin";
    pub const SHIELD_PER_LEVEL: u32 = 20;

    pub fn new() -> Self {
        Self
    }
}

impl EffectHandler for IronSkin {
    fn id(&self) -> &str {
        Self::ID
    }

    fn origin(&self) -> HandlerOrigin {
        HandlerOrigin::Ability
    }

    fn triggers(&self) -> &[TriggerKind] {
        &[TriggerKind::OnBattleStart]
    }

    fn applies_to(&self, state: &BattleState, _ctx: &EffectContext) -> bool {
        !living_where(state, |c| c.ability_level(Self::CARD) > 0).is_empty()
    }

    fn evaluate(
        &self,
        state: &BattleState,
        _ctx: &EffectContext,
        _rng: &mut BattleRng,
    ) -> Result<Option<Activation>, HandlerError> {
        let bearers = living_where(state, |c| c.ability_level(Self::CARD) > 0);
        Ok(Some(Activation::new(None, None).with_data(encode(&bearers)?)))
    }

    fn apply(&mut self, state: &mut BattleState, activation: Activation) -> Result<HandlerSummary, HandlerError> {
        let bearers: Vec<CombatantKey> = decode(&activation.data)?;
        let mut grants = Vec::with_capacity(bearers.len());
        for key in bearers {
            let bearer = lookup_mut(state, key)?;
            bearer.add_shield(Self::SHIELD_PER_LEVEL.saturating_mul(bearer.ability_level(Self::CARD)));
            grants.push(Grant {
                key,
                value: bearer.current_shield,
            });
        }
        Ok(HandlerSummary::from_activation(Self::ID, &activation).with_data(encode(&grants)?))
    }

    fn replay(&mut self, state: &mut BattleState, summary: &HandlerSummary) -> Result<(), HandlerError> {
        let grants: Vec<Grant> = summary.decode()?;
        for grant in &grants {
            lookup(state, grant.key)?;
        }
        for grant in grants {
            lookup_mut(state, grant.key)?.apply_shield(grant.value);
        }
        Ok(())
    }
}
