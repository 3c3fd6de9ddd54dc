//! # battle-sync
//!
//! Host-authoritative battle simulation for a two-player auto-battler.
//!
//! ## Design Principles
//!
//! 1. **One authority**: Only the host owns a randomness source. It resolves
//!    every roll and every handler, then replicates absolute results; the
//!    guest's mirror never rolls and never recomputes.
//!
//! 2. **Absolute sides**: State is keyed by `host`/`guest`. Each client
//!    translates to `player`/`opponent` only when presenting.
//!
//! 3. **Contained effects**: Handlers are registered plugins. A failing
//!    handler is rolled back and logged; the battle always continues.
//!
//! ## Architecture
//!
//! - **Persistent Data Structures**: O(1) snapshots via `im-rs`, used for
//!   handler rollback and checkpoints.
//!
//! - **Wire format**: JSON update messages carrying post-state values, with
//!   a per-battle sequence number.
//!
//! ## Modules
//!
//! - `core`: sides, combatant keys, RNG, configuration, errors
//! - `combatant`: heroes and creatures, vitals, statuses and counters
//! - `triggers`: the effect handler contract and registry
//! - `battle`: state, combat pipeline, scheduler, guest mirror, presentation
//! - `net`: update messages, payloads, transports, replication
//! - `checkpoint`: snapshots for reconnection
//! - `catalog`: reference handlers

pub mod core;
pub mod combatant;
pub mod triggers;
pub mod battle;
pub mod net;
pub mod checkpoint;
pub mod catalog;

// Re-export commonly used types
pub use crate::core::{
    AbsoluteSide, LocalSide, SideMap,
    CombatantKey, Position,
    BattleRng, BattleRngState,
    BattleConfig,
    BattleError, DesyncError, HandlerError,
};

pub use crate::combatant::{Combatant, StatusKind, StatusRules, StatusSet};

pub use crate::triggers::{
    Activation, Control, DamageKind, DeathPriority, EffectContext, EffectHandler,
    HandlerOrigin, HandlerOutcome, HandlerRegistry, HandlerSummary, TriggerKind,
};

pub use crate::battle::{
    Battle, BattleEvent, BattleObserver, BattleOutcome, BattlePhase, BattleState,
    HeroSlot, SideState, Step, StepKind, TurnResult,
    NullPresenter, PacedPresenter, Presenter, VisualCue,
};

pub use crate::net::{MessageLog, NullTransport, Payload, Transport, UpdateMessage};

pub use crate::checkpoint::Checkpoint;
