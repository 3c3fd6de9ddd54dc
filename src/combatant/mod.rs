//! Combatant data model and the status/counter subsystem.
//!
//! - [`Combatant`]: vitals, equipment, spellbook, statuses, custom stats
//! - [`StatusSet`]: stacking conditions, immunities, named counters
//! - [`StatusRules`]: end-of-round tick rules per status kind

mod combatant;
mod status;

pub use combatant::{Combatant, DamageOutcome, Equipment, SpellEntry};
pub use status::{Decay, StatusKind, StatusRule, StatusRules, StatusSet, StatusTick};
