//! Reference effect handlers.
//!
//! A small catalog that exercises every trigger kind: pre-damage rewrites,
//! on-hit statuses, on-kill payouts, reflection, rescue, revival,
//! battle-start and round-start buffs, and a creature action. Each handler
//! keys on a card name carried by the combatant (equipment, spell, ability
//! or the creature's own name).
//!
//! ```
//! use battle_sync::catalog::standard_handlers;
//! use battle_sync::triggers::{HandlerRegistry, TriggerKind};
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register_all(standard_handlers()).unwrap();
//! assert_eq!(registry.order_for(TriggerKind::WouldDie), vec!["guardian", "phoenix_feather"]);
//! ```

mod defense;
mod offense;
mod support;

pub use defense::{Guardian, IronSkin, PhoenixFeather, ThornMail};
pub use offense::{BountyCharm, CriticalStrike, FrostBolt, VenomFang};
pub use support::{MendingSprite, SupplyChain, WarDrum};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::battle::BattleState;
use crate::combatant::Combatant;
use crate::core::{CombatantKey, HandlerError};
use crate::triggers::EffectHandler;

/// Counter raised by War Drum; scales several other effects.
pub const MOMENTUM: &str = "momentum";

/// Every catalog handler, in a fixed registration order.
pub fn standard_handlers() -> Vec<Box<dyn EffectHandler>> {
    vec![
        Box::new(CriticalStrike::new()),
        Box::new(VenomFang::new()),
        Box::new(FrostBolt::new()),
        Box::new(BountyCharm::new()),
        Box::new(ThornMail::new()),
        Box::new(Guardian::new()),
        Box::new(PhoenixFeather::new()),
        Box::new(IronSkin::new()),
        Box::new(SupplyChain::new()),
        Box::new(WarDrum::new()),
        Box::new(MendingSprite::new()),
    ]
}

/// An absolute value granted to one combatant by a sweep handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct Grant {
    key: CombatantKey,
    value: u32,
}

fn encode<T: Serialize>(value: &T) -> Result<Value, HandlerError> {
    Ok(serde_json::to_value(value)?)
}

fn decode<T: DeserializeOwned>(value: &Value) -> Result<T, HandlerError> {
    Ok(serde_json::from_value(value.clone())?)
}

fn lookup(state: &BattleState, key: CombatantKey) -> Result<&Combatant, HandlerError> {
    state.get(key).ok_or(HandlerError::MissingCombatant(key))
}

fn lookup_mut(state: &mut BattleState, key: CombatantKey) -> Result<&mut Combatant, HandlerError> {
    state.get_mut(key).ok_or(HandlerError::MissingCombatant(key))
}

fn required(key: Option<CombatantKey>, what: &str) -> Result<CombatantKey, HandlerError> {
    key.ok_or_else(|| HandlerError::malformed(format!("missing {what}")))
}

/// Keys of every living combatant matching `pred`, in turn order.
fn living_where(state: &BattleState, pred: impl Fn(&Combatant) -> bool) -> Vec<CombatantKey> {
    state
        .turn_order()
        .into_iter()
        .filter(|&k| state.get(k).is_some_and(|c| c.is_alive() && pred(c)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triggers::{HandlerRegistry, TriggerKind};

    #[test]
    fn test_ids_are_unique() {
        let mut registry = HandlerRegistry::new();
        registry.register_all(standard_handlers()).unwrap();
        assert_eq!(registry.len(), 11);
    }

    #[test]
    fn test_every_trigger_is_covered() {
        let mut registry = HandlerRegistry::new();
        registry.register_all(standard_handlers()).unwrap();
        for trigger in TriggerKind::ALL {
            assert!(!registry.order_for(trigger).is_empty(), "{trigger} has no handler");
        }
    }

    #[test]
    fn test_equipment_before_spell_on_hit() {
        let mut registry = HandlerRegistry::new();
        registry.register_all(standard_handlers()).unwrap();
        assert_eq!(
            registry.order_for(TriggerKind::OnAttackHit),
            vec!["venom_fang", "frost_bolt"]
        );
    }
}
