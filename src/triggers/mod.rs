//! Effect handler system.
//!
//! Pluggable abilities, spells, artifacts, potions and creature effects
//! respond to battle events through the [`EffectHandler`] contract. The
//! combat pipeline fires a [`TriggerKind`] with an [`EffectContext`]; the
//! [`HandlerRegistry`] consults every subscribed handler in a fixed order.
//!
//! ## Key Components
//!
//! - [`TriggerKind`]: the points where handlers are consulted
//! - [`EffectContext`]: participants and damage of one event
//! - [`EffectHandler`]: evaluate on the host, replay on the guest
//! - [`HandlerSummary`]: what an applied handler changed, sent over the wire
//! - [`HandlerRegistry`]: ordered lookup with fault isolation
//!
//! ## Authority
//!
//! Only the host evaluates handlers and rolls dice. The guest never calls
//! `evaluate`; it receives summaries and calls `replay`, which must perform
//! the identical mutation without consulting any randomness.

mod chance;
mod context;
mod handler;
mod kind;
mod registry;

pub use chance::{additive_bonus, combined_chance, independent_rolls, multiplicative_bonus};
pub use context::{DamageKind, EffectContext};
pub use handler::{Activation, Control, EffectHandler, HandlerSummary};
pub use kind::{DeathPriority, HandlerOrigin, TriggerKind};
pub use registry::{HandlerOutcome, HandlerRegistry, Outcomes};
