//! The effect handler contract.
//!
//! Every pluggable ability, spell, artifact, potion or creature effect
//! implements [`EffectHandler`]:
//!
//! 1. `triggers` + `applies_to`: which trigger kinds and entities it cares about
//! 2. `evaluate`: host only; decides whether to activate, may roll
//! 3. `apply`: host only; mutates state, returns a serialisable summary
//! 4. `replay`: guest only; performs the identical mutation from the summary
//!
//! A handler that declines in `evaluate` leaves no trace in the message
//! stream. `replay` must never roll: every random outcome is in the summary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::battle::BattleState;
use crate::core::{BattleRng, CombatantKey, HandlerError};

use super::context::EffectContext;
use super::kind::{DeathPriority, HandlerOrigin, TriggerKind};

/// A decision to activate, produced by `evaluate`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Activation {
    pub source: Option<CombatantKey>,
    pub target: Option<CombatantKey>,
    /// Handler-specific data, including every rolled outcome.
    #[serde(default)]
    pub data: Value,
}

impl Activation {
    /// Create an activation with no data.
    #[must_use]
    pub fn new(source: Option<CombatantKey>, target: Option<CombatantKey>) -> Self {
        Self {
            source,
            target,
            data: Value::Null,
        }
    }

    /// Attach handler data (builder pattern).
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// Instruction from a handler to the combat pipeline.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Control {
    /// Nothing for the pipeline to do.
    #[default]
    Continue,
    /// Replace the pending damage amount (pre-damage handlers).
    SetDamage { damage: u32 },
    /// The dying combatant was restored by the handler.
    PreventDeath,
    /// Move the lethal damage onto another combatant.
    Redirect { to: CombatantKey },
    /// The handler performed the creature's action.
    TakeAction,
}

impl Control {
    /// Does this control consume a would-die event or a creature action?
    #[must_use]
    pub fn consumes(&self) -> bool {
        matches!(
            self,
            Control::PreventDeath | Control::Redirect { .. } | Control::TakeAction
        )
    }
}

/// What an applied handler changed. Sent verbatim to the guest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandlerSummary {
    pub handler: String,
    pub source: Option<CombatantKey>,
    pub target: Option<CombatantKey>,
    /// Absolute post-state the guest needs to replay the mutation.
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub control: Control,
}

impl HandlerSummary {
    /// Summary for an activation, carrying its participants.
    #[must_use]
    pub fn from_activation(handler: &str, activation: &Activation) -> Self {
        Self {
            handler: handler.to_string(),
            source: activation.source,
            target: activation.target,
            data: Value::Null,
            control: Control::Continue,
        }
    }

    /// Attach replay data (builder pattern).
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Attach a pipeline control (builder pattern).
    #[must_use]
    pub fn with_control(mut self, control: Control) -> Self {
        self.control = control;
        self
    }

    /// Decode the data payload into a handler-defined type.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, HandlerError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// A pluggable effect module.
pub trait EffectHandler {
    /// Unique, stable identifier. Used as the wire name in
    /// `handler_activated` messages and as the checkpoint component id.
    fn id(&self) -> &str;

    /// Where the effect comes from; drives execution order.
    fn origin(&self) -> HandlerOrigin;

    /// Trigger kinds this handler subscribes to.
    fn triggers(&self) -> &[TriggerKind];

    /// Order among would-die handlers.
    fn death_priority(&self) -> DeathPriority {
        DeathPriority::default()
    }

    /// Pure predicate: is this event about an entity this handler applies
    /// to (e.g. does the actor carry the artifact)?
    fn applies_to(&self, state: &BattleState, ctx: &EffectContext) -> bool {
        let _ = (state, ctx);
        true
    }

    /// Host only. Decide whether to activate. All randomness happens here.
    fn evaluate(
        &self,
        state: &BattleState,
        ctx: &EffectContext,
        rng: &mut BattleRng,
    ) -> Result<Option<Activation>, HandlerError>;

    /// Host only. Perform the mutation and describe it.
    fn apply(
        &mut self,
        state: &mut BattleState,
        activation: Activation,
    ) -> Result<HandlerSummary, HandlerError>;

    /// Guest only. Perform the identical mutation from a summary.
    fn replay(&mut self, state: &mut BattleState, summary: &HandlerSummary) -> Result<(), HandlerError>;

    /// Clear per-round bookkeeping.
    fn reset_round(&mut self) {}

    /// Export internal per-battle bookkeeping for a checkpoint.
    fn export_state(&self) -> Option<Value> {
        None
    }

    /// Restore bookkeeping. `None` means "no prior state".
    fn import_state(&mut self, state: Option<&Value>) {
        let _ = state;
    }

    /// The battle is being torn down; drop anything pending.
    fn teardown(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AbsoluteSide, Position};

    #[test]
    fn test_control_consumes() {
        assert!(!Control::Continue.consumes());
        assert!(!Control::SetDamage { damage: 3 }.consumes());
        assert!(Control::PreventDeath.consumes());
        assert!(Control::TakeAction.consumes());
        let to = CombatantKey::hero(AbsoluteSide::Host, Position::Left);
        assert!(Control::Redirect { to }.consumes());
    }

    #[test]
    fn test_summary_serialization() {
        let key = CombatantKey::hero(AbsoluteSide::Guest, Position::Center);
        let activation = Activation::new(Some(key), None).with_data(serde_json::json!({"n": 1}));
        let summary = HandlerSummary::from_activation("venom_fang", &activation)
            .with_data(serde_json::json!({"total": 2}))
            .with_control(Control::SetDamage { damage: 80 });

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["control"], serde_json::json!({"type": "set_damage", "damage": 80}));

        let back: HandlerSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back, summary);
    }

    #[test]
    fn test_decode_malformed() {
        #[derive(Debug, Deserialize)]
        struct Data {
            #[allow(dead_code)]
            total: u32,
        }

        let summary = HandlerSummary {
            handler: "x".into(),
            source: None,
            target: None,
            data: serde_json::json!({"total": "lots"}),
            control: Control::Continue,
        };
        assert!(matches!(summary.decode::<Data>(), Err(HandlerError::Malformed(_))));
    }
}
