//! Network replication layer.
//!
//! The host turns every authoritative mutation into an [`UpdateMessage`]
//! and sends it through a [`Transport`]; the guest applies messages to its
//! mirror strictly in sequence order (see `Battle::on_update`).
//!
//! ## Side translation
//!
//! Payloads name sides absolutely (`host`/`guest`). Each client maps them
//! to `player`/`opponent` with `AbsoluteSide::to_local` only when
//! presenting, so both ends agree on every lookup key.

mod message;
mod payload;
mod replicator;
mod transport;

pub use message::{Payload, UpdateMessage};
pub use payload::{
    AttackResolved, BattleEnded, BattleStarted, CombatantDied, DamageRedirected, EndReason,
    HandlerActivated, RoundEnded, RoundStarted, SkipReason, StatusTicked, TurnSkipped, TurnStarted,
    CORE_KINDS,
};
pub use replicator::{ReplicationState, Replicator};
pub use transport::{MessageLog, NullTransport, Transport, TransportError};
