//! The battle aggregate.
//!
//! A [`Battle`] owns both rosters, the round/turn counters, the randomness
//! source (host only), the handler registry, the scheduler and the
//! replication endpoint. It is created with one of two roles:
//!
//! - **host**: authoritative. Runs the scheduler and the combat pipeline,
//!   rolls every die, and sends one update per mutation.
//! - **guest**: a read-mostly mirror. Never rolls; applies the host's
//!   updates in sequence order through [`Battle::on_update`].
//!
//! ## Lifecycle
//!
//! `Setup` → `start()` → `Running` → (defeat, surrender, round cap or
//! `end()`) → `Ended`. Once ended, the host is muted and every handler has
//! been torn down; further calls are no-ops or return `BattleOver`.
//!
//! ## Example
//!
//! ```
//! use battle_sync::battle::{Battle, NullPresenter, SideState};
//! use battle_sync::combatant::Combatant;
//! use battle_sync::core::{AbsoluteSide, BattleConfig, Position, SideMap};
//! use battle_sync::net::MessageLog;
//!
//! let mut roster = SideMap::default();
//! roster[AbsoluteSide::Host] = SideState::new().with_hero(Position::Left, Combatant::new("Ayla", 100, 50));
//! roster[AbsoluteSide::Guest] = SideState::new().with_hero(Position::Left, Combatant::new("Cid", 60, 10));
//!
//! let log = MessageLog::new();
//! let mut host = Battle::host(BattleConfig::new(7), roster.clone(), Box::new(log.clone()));
//! let outcome = host.run(&mut NullPresenter).unwrap();
//! assert_eq!(outcome.winner, Some(AbsoluteSide::Host));
//!
//! let mut guest = Battle::guest(BattleConfig::new(7), roster);
//! for message in log.messages() {
//!     guest.on_update(&message).unwrap();
//! }
//! assert_eq!(guest.state(), host.state());
//! ```

mod mirror;
mod observer;
mod pipeline;
mod presenter;
mod scheduler;
mod state;

pub use observer::{BattleEvent, BattleObserver};
pub use pipeline::TurnResult;
pub use presenter::{NullPresenter, PacedPresenter, Presenter, VisualCue};
pub use scheduler::{Scheduler, Step, StepKind};
pub use state::{BattleState, HeroSlot, SideState};

use im::OrdMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::{AbsoluteSide, BattleConfig, BattleError, BattleRng, BattleRngState, SideMap};
use crate::net::{BattleEnded, BattleStarted, EndReason, Replicator, Transport, UpdateMessage};
use crate::triggers::{EffectContext, EffectHandler, HandlerRegistry, TriggerKind};

/// Counter prefix marking post-battle rewards.
pub const REWARD_PREFIX: &str = "reward:";

/// Where the battle is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattlePhase {
    #[default]
    Setup,
    Running,
    Ended,
}

/// Final result of a battle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleOutcome {
    /// `None` for a draw or an aborted battle.
    pub winner: Option<AbsoluteSide>,
    pub reason: EndReason,
    pub round: u32,
}

/// One battle between a host and a guest.
pub struct Battle {
    pub(crate) config: BattleConfig,
    pub(crate) role: AbsoluteSide,
    pub(crate) state: BattleState,
    pub(crate) rng: Option<BattleRng>,
    pub(crate) registry: HandlerRegistry,
    pub(crate) scheduler: Scheduler,
    pub(crate) replicator: Replicator,
    pub(crate) observers: Vec<Box<dyn BattleObserver>>,
    pub(crate) phase: BattlePhase,
    pub(crate) outcome: Option<BattleOutcome>,
    pub(crate) checkpoint_recommended: bool,
}

impl std::fmt::Debug for Battle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Battle")
            .field("role", &self.role)
            .field("phase", &self.phase)
            .field("round", &self.state.round)
            .field("turn", &self.state.current_turn)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Battle {
    /// Create the authoritative host battle.
    pub fn host(config: BattleConfig, roster: SideMap<SideState>, transport: Box<dyn Transport>) -> Self {
        let rng = BattleRng::new(config.seed);
        Self::with_role(config, roster, AbsoluteSide::Host, Some(rng), Replicator::new(transport))
    }

    /// Create a guest mirror. It owns no randomness source.
    pub fn guest(config: BattleConfig, roster: SideMap<SideState>) -> Self {
        Self::with_role(config, roster, AbsoluteSide::Guest, None, Replicator::default())
    }

    fn with_role(
        config: BattleConfig,
        roster: SideMap<SideState>,
        role: AbsoluteSide,
        rng: Option<BattleRng>,
        replicator: Replicator,
    ) -> Self {
        Self {
            config,
            role,
            state: BattleState::new(roster),
            rng,
            registry: HandlerRegistry::new(),
            scheduler: Scheduler::default(),
            replicator,
            observers: Vec::new(),
            phase: BattlePhase::Setup,
            outcome: None,
            checkpoint_recommended: false,
        }
    }

    // === Registration ===

    /// Register an effect handler. Both clients must register the same set.
    pub fn register(&mut self, handler: Box<dyn EffectHandler>) -> Result<(), BattleError> {
        self.registry.register(handler)
    }

    /// Register several handlers in order.
    pub fn register_all(
        &mut self,
        handlers: impl IntoIterator<Item = Box<dyn EffectHandler>>,
    ) -> Result<(), BattleError> {
        self.registry.register_all(handlers)
    }

    /// Subscribe to battle events.
    pub fn subscribe(&mut self, observer: Box<dyn BattleObserver>) {
        self.observers.push(observer);
    }

    // === Accessors ===

    /// The battle state.
    #[must_use]
    pub fn state(&self) -> &BattleState {
        &self.state
    }

    /// The configuration this battle was built with.
    #[must_use]
    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    /// This client's absolute side.
    #[must_use]
    pub fn role(&self) -> AbsoluteSide {
        self.role
    }

    /// Is this the authoritative host?
    #[must_use]
    pub fn is_host(&self) -> bool {
        self.rng.is_some()
    }

    /// The handler registry.
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> BattlePhase {
        self.phase
    }

    /// Has the battle ended?
    #[must_use]
    pub fn is_over(&self) -> bool {
        self.phase == BattlePhase::Ended
    }

    /// Final result, once ended.
    #[must_use]
    pub fn outcome(&self) -> Option<BattleOutcome> {
        self.outcome
    }

    /// Winning side, once ended with a winner.
    #[must_use]
    pub fn winner(&self) -> Option<AbsoluteSide> {
        self.outcome.and_then(|o| o.winner)
    }

    /// Randomness source position (host only).
    #[must_use]
    pub fn rng_state(&self) -> Option<BattleRngState> {
        self.rng.as_ref().map(BattleRng::state)
    }

    /// Has the guest skipped an update it could not apply?
    #[must_use]
    pub fn checkpoint_recommended(&self) -> bool {
        self.checkpoint_recommended
    }

    /// Post-battle rewards accumulated on one side, by reward name.
    ///
    /// Collected from counters named `reward:<name>` on every combatant of
    /// the side, for the external reward flow.
    #[must_use]
    pub fn rewards(&self, side: AbsoluteSide) -> OrdMap<String, u32> {
        let mut totals = OrdMap::new();
        for key in self.state.keys(side) {
            let Some(combatant) = self.state.get(key) else {
                continue;
            };
            for (name, value) in combatant.statuses.counters() {
                if let Some(reward) = name.strip_prefix(REWARD_PREFIX) {
                    let current = totals.get(reward).copied().unwrap_or(0u32);
                    totals.insert(reward.to_string(), current.saturating_add(value));
                }
            }
        }
        totals
    }

    // === Lifecycle ===

    /// Host only. Start the battle: send `battle_started` and run
    /// battle-start handlers. Returns the messages sent.
    ///
    /// Calling it on a running battle does nothing.
    pub fn start(&mut self) -> Result<Vec<UpdateMessage>, BattleError> {
        self.ensure_host()?;
        match self.phase {
            BattlePhase::Ended => return Err(BattleError::BattleOver),
            BattlePhase::Running => return Ok(Vec::new()),
            BattlePhase::Setup => {}
        }

        self.phase = BattlePhase::Running;
        info!(
            seed = self.config.seed,
            combatants = self.state.combatant_count(),
            handlers = self.registry.len(),
            "battle started"
        );
        self.replicator.send(&BattleStarted {
            max_rounds: self.config.max_rounds,
        });

        let mut ctx = EffectContext::new(TriggerKind::OnBattleStart, self.state.round);
        self.fire(&mut ctx)?;
        self.check_defeat();

        Ok(self.replicator.take_sent())
    }

    /// Host only. `side` concedes; the other side wins.
    pub fn surrender(&mut self, side: AbsoluteSide) -> Result<Vec<UpdateMessage>, BattleError> {
        self.ensure_host()?;
        if self.is_over() {
            return Err(BattleError::BattleOver);
        }
        info!(%side, "side surrendered");
        self.finish(Some(side.opposite()), EndReason::Surrender);
        Ok(self.replicator.take_sent())
    }

    /// Tear the battle down without a result. Idempotent: once ended,
    /// later calls do nothing and send nothing.
    pub fn end(&mut self) -> Vec<UpdateMessage> {
        if !self.is_over() {
            self.finish(None, EndReason::Aborted);
        }
        self.replicator.take_sent()
    }

    /// Record the result, notify the guest once, then mute and tear down.
    pub(crate) fn finish(&mut self, winner: Option<AbsoluteSide>, reason: EndReason) {
        let outcome = BattleOutcome {
            winner,
            reason,
            round: self.state.round,
        };
        self.replicator.send(&BattleEnded {
            winner,
            reason,
            round: outcome.round,
        });
        self.conclude(outcome);
    }

    /// Shared by host `finish` and guest replay of `battle_ended`.
    pub(crate) fn conclude(&mut self, outcome: BattleOutcome) {
        self.phase = BattlePhase::Ended;
        self.outcome = Some(outcome);
        self.replicator.mute();
        self.registry.teardown();

        info!(winner = ?outcome.winner, reason = ?outcome.reason, round = outcome.round, "battle ended");
        self.notify(BattleEvent::BattleEnded {
            winner: outcome.winner,
            reason: outcome.reason,
        });
    }

    /// End the battle if a side has been wiped out. Returns `true` if it ended.
    pub(crate) fn check_defeat(&mut self) -> bool {
        if self.is_over() {
            return true;
        }
        let host_down = self.state.is_defeated(AbsoluteSide::Host);
        let guest_down = self.state.is_defeated(AbsoluteSide::Guest);

        let winner = match (host_down, guest_down) {
            (false, false) => return false,
            (true, true) => None,
            (true, false) => Some(AbsoluteSide::Guest),
            (false, true) => Some(AbsoluteSide::Host),
        };
        self.finish(winner, EndReason::Defeat);
        true
    }

    pub(crate) fn notify(&mut self, event: BattleEvent) {
        debug!(?event, "battle event");
        for observer in &mut self.observers {
            observer.on_event(&event);
        }
    }

    pub(crate) fn ensure_host(&self) -> Result<(), BattleError> {
        if self.is_host() {
            Ok(())
        } else {
            Err(BattleError::NotAuthoritative)
        }
    }
}
