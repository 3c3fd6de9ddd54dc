//! Combat resolution pipeline.
//!
//! `resolve_actor_turn` runs one actor's action on the host:
//!
//! 1. validate the actor (missing, dead or disabled actors skip the turn)
//! 2. creature actions: a creature-action handler may replace the attack
//! 3. select a target; none means the turn is skipped
//! 4. pre-damage handlers rewrite the damage, each seeing the previous value
//! 5. apply damage (shield first) and send `attack_resolved`
//! 6. lethal hits go through would-die handlers: one rescue or revival may
//!    consume the death, otherwise the target is finalized
//! 7. damage-taken, on-hit and (if the target died) on-kill handlers
//!
//! Every mutation is sent as it happens. Handler faults are contained by the
//! registry, so a turn always completes.

use tracing::{debug, warn};

use crate::combatant::{Combatant, StatusKind};
use crate::core::{BattleError, CombatantKey};
use crate::net::{
    AttackResolved, CombatantDied, DamageRedirected, HandlerActivated, SkipReason, StatusTicked,
    TurnSkipped, TurnStarted, UpdateMessage,
};
use crate::triggers::{Control, DamageKind, EffectContext, HandlerOutcome, Outcomes, TriggerKind};

use super::observer::BattleEvent;
use super::{Battle, BattlePhase};

/// Everything one actor's turn did.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnResult {
    pub actor: CombatantKey,
    /// Who was attacked (before any redirection).
    pub target: Option<CombatantKey>,
    /// Who actually absorbed the hit (the rescuer after a redirection).
    pub struck: Option<CombatantKey>,
    pub skipped: Option<SkipReason>,
    /// A creature-action handler performed the action instead of an attack.
    pub action_replaced: bool,
    /// Damage after pre-damage handlers.
    pub damage: u32,
    pub target_died: bool,
    /// Every handler consulted, in order.
    pub outcomes: Vec<HandlerOutcome>,
    /// Every update sent during the turn, in order.
    pub messages: Vec<UpdateMessage>,
}

impl TurnResult {
    fn new(actor: CombatantKey) -> Self {
        Self {
            actor,
            target: None,
            struck: None,
            skipped: None,
            action_replaced: false,
            damage: 0,
            target_died: false,
            outcomes: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Handler ids that activated during the turn.
    pub fn activated(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter_map(HandlerOutcome::summary)
            .map(|s| s.handler.as_str())
    }
}

impl Battle {
    /// Host only. Resolve one actor's turn.
    ///
    /// Invalid actors are not an error: the turn is skipped and reported in
    /// the result.
    pub fn resolve_actor_turn(&mut self, actor: CombatantKey) -> Result<TurnResult, BattleError> {
        self.ensure_host()?;
        if self.phase == BattlePhase::Ended {
            return Err(BattleError::BattleOver);
        }

        let mut result = TurnResult::new(actor);
        let round = self.state.round;
        self.state.current_turn += 1;

        let check = match self.state.get(actor) {
            None => Some(SkipReason::Missing),
            Some(c) if !c.is_alive() => Some(SkipReason::Dead),
            Some(c) if c.statuses.is_disabled() => Some(SkipReason::Disabled),
            Some(_) => None,
        };
        if let Some(reason) = check {
            return Ok(self.skip(result, reason));
        }

        self.replicator.send(&TurnStarted {
            round,
            turn: self.state.current_turn,
            actor,
        });
        debug!(%actor, round, turn = self.state.current_turn, "turn started");

        if !actor.is_hero() {
            let mut ctx = EffectContext::new(TriggerKind::CreatureAction, round).with_actor(actor);
            ctx.target = self.state.select_target(actor);
            let outcomes = self.fire(&mut ctx)?;
            result.action_replaced = outcomes
                .iter()
                .filter_map(HandlerOutcome::summary)
                .any(|s| s.control == Control::TakeAction);
            result.outcomes.extend(outcomes);

            if result.action_replaced {
                return Ok(self.complete(result));
            }
        }

        let Some(target) = self.state.select_target(actor) else {
            return Ok(self.skip(result, SkipReason::NoTarget));
        };
        result.target = Some(target);

        let attack = self.state.get(actor).map_or(0, Combatant::attack);
        let mut ctx = EffectContext::new(TriggerKind::PreDamage, round)
            .with_actor(actor)
            .with_target(target)
            .with_damage(attack, DamageKind::Normal);
        result.outcomes.extend(self.fire(&mut ctx)?);
        result.damage = ctx.damage;

        let Some(defender) = self.state.get_mut(target) else {
            warn!(%target, "target vanished during pre-damage handlers");
            return Ok(self.complete(result));
        };
        let before = (defender.current_hp, defender.current_shield);
        let hit = defender.take_damage(ctx.damage);

        self.replicator.send(&AttackResolved {
            attacker: actor,
            target,
            damage: ctx.damage,
            absorbed: hit.absorbed,
            new_hp: hit.new_hp,
            new_shield: hit.new_shield,
        });
        debug!(%actor, %target, damage = ctx.damage, new_hp = hit.new_hp, "attack resolved");

        let struck = if hit.lethal {
            self.resolve_lethal(target, ctx.clone(), before, &mut result.outcomes)?
        } else {
            target
        };
        result.struck = Some(struck);

        let survived = self.state.is_alive(struck);
        let mut after = ctx.retrigger(TriggerKind::OnDamageTaken);
        after.target = Some(struck);
        after.target_survived = survived;
        after.redirected = struck != target;
        result.outcomes.extend(self.fire(&mut after)?);

        let mut on_hit = after.retrigger(TriggerKind::OnAttackHit);
        result.outcomes.extend(self.fire(&mut on_hit)?);

        if !survived {
            result.target_died = true;
            let mut on_kill = on_hit.retrigger(TriggerKind::OnKill);
            result.outcomes.extend(self.fire(&mut on_kill)?);
        }

        Ok(self.complete(result))
    }

    /// Consult would-die handlers for `target`, whose HP just reached 0.
    ///
    /// Returns the combatant that ended up holding the damage: the original
    /// target, or the rescuer after a redirection. `before` is the target's
    /// HP and shield prior to the hit, restored when the damage is moved.
    pub(crate) fn resolve_lethal(
        &mut self,
        target: CombatantKey,
        mut ctx: EffectContext,
        before: (u32, u32),
        outcomes: &mut Vec<HandlerOutcome>,
    ) -> Result<CombatantKey, BattleError> {
        ctx.trigger = TriggerKind::WouldDie;
        ctx.target = Some(target);

        let fired = self.fire(&mut ctx)?;
        let consumed = fired
            .iter()
            .filter_map(HandlerOutcome::summary)
            .find(|s| s.control.consumes())
            .map(|s| (s.handler.clone(), s.control.clone()));
        outcomes.extend(fired);

        match consumed {
            Some((handler, Control::PreventDeath)) if self.state.is_alive(target) => {
                debug!(%target, %handler, "death prevented");
                self.notify(BattleEvent::CombatantRevived { key: target, handler });
                Ok(target)
            }
            Some((handler, Control::Redirect { to }))
                if !ctx.redirected && to != target && self.state.is_alive(to) =>
            {
                debug!(%target, rescuer = %to, %handler, "damage redirected");
                self.redirect(ctx, target, to, before, outcomes)
            }
            Some((handler, control)) => {
                warn!(%target, %handler, ?control, "death control not applicable, finalizing");
                self.finalize_death(target, ctx.actor);
                Ok(target)
            }
            None => {
                self.finalize_death(target, ctx.actor);
                Ok(target)
            }
        }
    }

    fn redirect(
        &mut self,
        ctx: EffectContext,
        from: CombatantKey,
        to: CombatantKey,
        before: (u32, u32),
        outcomes: &mut Vec<HandlerOutcome>,
    ) -> Result<CombatantKey, BattleError> {
        if let Some(original) = self.state.get_mut(from) {
            original.apply_hp(before.0);
            original.apply_shield(before.1);
        }

        let Some(rescuer) = self.state.get_mut(to) else {
            return Ok(from);
        };
        let rescuer_before = (rescuer.current_hp, rescuer.current_shield);
        let hit = match ctx.damage_kind {
            DamageKind::Normal => rescuer.take_damage(ctx.damage),
            DamageKind::Status => rescuer.take_direct_damage(ctx.damage),
        };

        self.replicator.send(&DamageRedirected {
            from,
            to,
            damage: ctx.damage,
            from_hp: before.0,
            from_shield: before.1,
            new_hp: hit.new_hp,
            new_shield: hit.new_shield,
        });

        if hit.lethal {
            let mut next = ctx;
            next.redirected = true;
            self.resolve_lethal(to, next, rescuer_before, outcomes)?;
        }
        Ok(to)
    }

    /// Mark `key` dead, send `combatant_died` and notify observers.
    pub(crate) fn finalize_death(&mut self, key: CombatantKey, killer: Option<CombatantKey>) {
        let Some(combatant) = self.state.get_mut(key) else {
            return;
        };
        combatant.finalize_death();
        self.replicator.send(&CombatantDied { key, killer });
        debug!(%key, "combatant died");
        self.notify(BattleEvent::CombatantDied { key, killer });
    }

    /// Tick every status on every living combatant, in turn order.
    pub(crate) fn tick_statuses(&mut self) -> Result<(), BattleError> {
        let round = self.state.round;
        for key in self.state.turn_order() {
            for kind in StatusKind::ALL {
                let rules = &self.config.status_rules;
                let Some(combatant) = self.state.get_mut(key) else {
                    break;
                };
                if !combatant.is_alive() {
                    break;
                }
                let Some(tick) = combatant.statuses.tick_one(kind, rules) else {
                    continue;
                };

                let before = (combatant.current_hp, combatant.current_shield);
                let hit = combatant.take_direct_damage(tick.damage);
                self.replicator.send(&StatusTicked {
                    key,
                    status: kind,
                    damage: tick.damage,
                    remaining: tick.remaining,
                    new_hp: hit.new_hp,
                });

                if hit.lethal {
                    let ctx = EffectContext::new(TriggerKind::WouldDie, round)
                        .with_damage(tick.damage, DamageKind::Status);
                    let mut outcomes = Vec::new();
                    self.resolve_lethal(key, ctx, before, &mut outcomes)?;
                }
            }
        }
        Ok(())
    }

    /// Invoke the handlers for `ctx.trigger` and send one
    /// `handler_activated` update per activation.
    pub(crate) fn fire(&mut self, ctx: &mut EffectContext) -> Result<Outcomes, BattleError> {
        let rng = self.rng.as_mut().ok_or(BattleError::NotAuthoritative)?;
        let outcomes = self.registry.invoke(ctx, &mut self.state, rng);

        for outcome in &outcomes {
            if let HandlerOutcome::Activated { trigger, summary } = outcome {
                self.replicator.send(&HandlerActivated {
                    trigger: *trigger,
                    summary: summary.clone(),
                });
            }
        }
        Ok(outcomes)
    }

    fn skip(&mut self, mut result: TurnResult, reason: SkipReason) -> TurnResult {
        debug!(actor = %result.actor, %reason, "turn skipped");
        self.replicator.send(&TurnSkipped {
            round: self.state.round,
            turn: self.state.current_turn,
            actor: result.actor,
            reason,
        });
        result.skipped = Some(reason);
        self.complete(result)
    }

    fn complete(&mut self, mut result: TurnResult) -> TurnResult {
        result.messages = self.replicator.take_sent();
        result
    }
}
