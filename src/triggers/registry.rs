//! Effect handler registry.
//!
//! The registry is Battle-scoped: handler modules are registered into it at
//! startup, never into process-wide globals. It provides ordered lookup per
//! trigger kind and isolates handler faults so one misbehaving effect can
//! never halt a turn.
//!
//! ## Ordering
//!
//! Per trigger kind, handlers run by origin (equipment, spell, ability,
//! creature, potion, status) and then by registration order. Would-die
//! handlers are ordered by [`DeathPriority`] first, so rescues are always
//! consulted before revivals regardless of origin.

use std::panic::{self, AssertUnwindSafe};

use rustc_hash::FxHashMap;
use serde_json::Value;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::battle::BattleState;
use crate::core::{BattleError, BattleRng, DesyncError, HandlerError};

use super::context::EffectContext;
use super::handler::{Control, EffectHandler, HandlerSummary};
use super::kind::{DeathPriority, HandlerOrigin, TriggerKind};

/// What happened to one handler during an invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum HandlerOutcome {
    /// The handler activated and mutated state.
    Activated {
        trigger: TriggerKind,
        summary: HandlerSummary,
    },
    /// The handler evaluated and chose not to activate.
    Declined { handler: String },
    /// The handler failed; its contribution was discarded.
    Faulted { handler: String, error: HandlerError },
}

impl HandlerOutcome {
    /// The summary, if the handler activated.
    #[must_use]
    pub fn summary(&self) -> Option<&HandlerSummary> {
        match self {
            HandlerOutcome::Activated { summary, .. } => Some(summary),
            _ => None,
        }
    }
}

/// Outcomes of one invocation; most triggers wake only a few handlers.
pub type Outcomes = SmallVec<[HandlerOutcome; 4]>;

struct Registered {
    handler: Box<dyn EffectHandler>,
    origin: HandlerOrigin,
    priority: DeathPriority,
    seq: u32,
}

/// Battle-scoped registry of effect handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<Registered>,
    by_trigger: FxHashMap<TriggerKind, SmallVec<[usize; 8]>>,
    next_seq: u32,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.ids().collect::<Vec<_>>())
            .finish()
    }
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Ids must be unique within a battle.
    pub fn register(&mut self, handler: Box<dyn EffectHandler>) -> Result<(), BattleError> {
        let id = handler.id().to_string();
        if self.contains(&id) {
            return Err(BattleError::DuplicateHandler(id));
        }

        self.handlers.push(Registered {
            origin: handler.origin(),
            priority: handler.death_priority(),
            handler,
            seq: self.next_seq,
        });
        self.next_seq += 1;
        self.rebuild_index();

        debug!(handler = %id, "handler registered");
        Ok(())
    }

    /// Register several handlers in order.
    pub fn register_all(
        &mut self,
        handlers: impl IntoIterator<Item = Box<dyn EffectHandler>>,
    ) -> Result<(), BattleError> {
        for handler in handlers {
            self.register(handler)?;
        }
        Ok(())
    }

    /// Remove a handler by id.
    pub fn unregister(&mut self, id: &str) -> Option<Box<dyn EffectHandler>> {
        let pos = self.handlers.iter().position(|r| r.handler.id() == id)?;
        let removed = self.handlers.remove(pos);
        self.rebuild_index();
        Some(removed.handler)
    }

    fn rebuild_index(&mut self) {
        self.by_trigger.clear();
        for (idx, registered) in self.handlers.iter().enumerate() {
            for &trigger in registered.handler.triggers() {
                self.by_trigger.entry(trigger).or_default().push(idx);
            }
        }

        let handlers = &self.handlers;
        for (trigger, list) in self.by_trigger.iter_mut() {
            list.sort_by_key(|&idx| {
                let r = &handlers[idx];
                if *trigger == TriggerKind::WouldDie {
                    (r.priority, r.origin, r.seq)
                } else {
                    (DeathPriority::default(), r.origin, r.seq)
                }
            });
        }
    }

    /// Is a handler with this id registered?
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.handlers.iter().any(|r| r.handler.id() == id)
    }

    /// Handler ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|r| r.handler.id())
    }

    /// Handler ids subscribed to a trigger, in execution order.
    #[must_use]
    pub fn order_for(&self, trigger: TriggerKind) -> Vec<&str> {
        self.by_trigger
            .get(&trigger)
            .map(|list| list.iter().map(|&i| self.handlers[i].handler.id()).collect())
            .unwrap_or_default()
    }

    /// Get total handler count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Host only. Consult every handler subscribed to `ctx.trigger`.
    ///
    /// - `SetDamage` controls update `ctx.damage` before the next handler runs.
    /// - For exclusive triggers (would-die, creature action) the first
    ///   consuming handler ends the invocation.
    /// - Redirected damage is never offered to rescue handlers, so a rescuer
    ///   dying from it can only be revived or finalized.
    /// - A handler whose `apply` fails is rolled back: state and the
    ///   handler's own bookkeeping are restored from snapshots.
    pub fn invoke(
        &mut self,
        ctx: &mut EffectContext,
        state: &mut BattleState,
        rng: &mut BattleRng,
    ) -> Outcomes {
        let trigger = ctx.trigger;
        let rescue_barred = trigger == TriggerKind::WouldDie && ctx.redirected;
        let mut outcomes = Outcomes::new();

        let Some(order) = self.by_trigger.get(&trigger).cloned() else {
            return outcomes;
        };

        for idx in order {
            if rescue_barred && self.handlers[idx].priority == DeathPriority::Rescue {
                debug!(handler = %self.handlers[idx].handler.id(), "rescue skipped on redirected damage");
                continue;
            }
            let handler = &mut self.handlers[idx].handler;
            let id = handler.id().to_string();

            let current: &EffectContext = ctx;
            let view: &BattleState = state;
            match guarded(|| Ok(handler.applies_to(view, current))) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(error) => {
                    warn!(handler = %id, %trigger, %error, "handler predicate faulted");
                    outcomes.push(HandlerOutcome::Faulted { handler: id, error });
                    continue;
                }
            }

            let activation = match guarded(|| handler.evaluate(view, current, rng)) {
                Ok(Some(activation)) => activation,
                Ok(None) => {
                    outcomes.push(HandlerOutcome::Declined { handler: id });
                    continue;
                }
                Err(error) => {
                    warn!(handler = %id, %trigger, %error, "handler evaluate faulted");
                    outcomes.push(HandlerOutcome::Faulted { handler: id, error });
                    continue;
                }
            };

            let snapshot = state.clone();
            let bookkeeping = handler.export_state();

            match guarded(|| handler.apply(state, activation)) {
                Ok(summary) => {
                    if let Control::SetDamage { damage } = summary.control {
                        ctx.damage = damage;
                    }
                    let consumed = summary.control.consumes();
                    debug!(handler = %id, %trigger, control = ?summary.control, "handler activated");
                    outcomes.push(HandlerOutcome::Activated { trigger, summary });

                    if consumed && trigger.is_exclusive() {
                        break;
                    }
                }
                Err(error) => {
                    *state = snapshot;
                    handler.import_state(bookkeeping.as_ref());
                    warn!(handler = %id, %trigger, %error, "handler apply faulted, rolled back");
                    outcomes.push(HandlerOutcome::Faulted { handler: id, error });
                }
            }
        }

        outcomes
    }

    /// Guest only. Replay a summary received from the host.
    pub fn replay(&mut self, summary: &HandlerSummary, state: &mut BattleState) -> Result<(), DesyncError> {
        let Some(registered) = self
            .handlers
            .iter_mut()
            .find(|r| r.handler.id() == summary.handler)
        else {
            return Err(DesyncError::UnknownHandler(summary.handler.clone()));
        };
        let handler = &mut registered.handler;

        let snapshot = state.clone();
        let bookkeeping = handler.export_state();

        guarded(|| handler.replay(state, summary)).map_err(|error| {
            *state = snapshot;
            handler.import_state(bookkeeping.as_ref());
            DesyncError::Rejected(error)
        })
    }

    /// Clear every handler's per-round bookkeeping.
    pub fn reset_round(&mut self) {
        for registered in &mut self.handlers {
            registered.handler.reset_round();
        }
    }

    /// Export bookkeeping of every handler that has any.
    pub fn export_states(&self) -> Vec<(String, Value)> {
        self.handlers
            .iter()
            .filter_map(|r| r.handler.export_state().map(|s| (r.handler.id().to_string(), s)))
            .collect()
    }

    /// Restore one handler's bookkeeping. Unknown ids are ignored.
    pub fn import_state(&mut self, id: &str, state: Option<&Value>) {
        if let Some(registered) = self.handlers.iter_mut().find(|r| r.handler.id() == id) {
            registered.handler.import_state(state);
        }
    }

    /// Tear down every handler.
    pub fn teardown(&mut self) {
        for registered in &mut self.handlers {
            registered.handler.teardown();
        }
    }
}

/// Run handler code, converting a panic into a handler fault.
fn guarded<T>(f: impl FnOnce() -> Result<T, HandlerError>) -> Result<T, HandlerError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(HandlerError::Panicked(message))
        }
    }
}
