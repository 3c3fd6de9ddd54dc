//! Core battle types: sides, lookup keys, RNG, configuration, errors.
//!
//! This module contains the building blocks shared by every subsystem.
//! Nothing in here knows about specific abilities or the wire protocol.

pub mod side;
pub mod key;
pub mod rng;
pub mod config;
pub mod error;

pub use side::{AbsoluteSide, LocalSide, SideMap};
pub use key::{CombatantKey, Position};
pub use rng::{BattleRng, BattleRngState};
pub use config::BattleConfig;
pub use error::{BattleError, DesyncError, HandlerError};
