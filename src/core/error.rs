//! Error taxonomy.
//!
//! - [`BattleError`]: returned from public entry points.
//! - [`HandlerError`]: a pluggable effect handler could not produce or apply
//!   its contribution (handler fault or resource fault). Always recovered by
//!   skipping that handler.
//! - [`DesyncError`]: the guest could not apply an update. Always recovered
//!   by skipping that update and recommending a checkpoint restore.

use thiserror::Error;

use super::key::CombatantKey;

/// Errors surfaced by `Battle` entry points.
#[derive(Debug, Error)]
pub enum BattleError {
    /// A host-only operation was invoked on a guest mirror.
    #[error("operation requires the authoritative host")]
    NotAuthoritative,

    /// The battle has already ended.
    #[error("battle is over")]
    BattleOver,

    /// A handler with the same id is already registered.
    #[error("handler `{0}` is already registered")]
    DuplicateHandler(String),

    /// Configuration document could not be parsed.
    #[error("invalid battle config: {0}")]
    Config(#[source] serde_json::Error),

    /// Checkpoint could not be encoded or decoded.
    #[error("invalid checkpoint: {0}")]
    Checkpoint(#[source] serde_json::Error),

    /// An update payload could not be encoded.
    #[error("payload for `{kind}` could not be encoded: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Fault raised by a pluggable effect handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// A required external manager (hand, deck, gold) is unavailable.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(&'static str),

    /// Activation data or a replay summary is malformed.
    #[error("malformed data: {0}")]
    Malformed(String),

    /// A referenced combatant does not exist.
    #[error("combatant {0} not found")]
    MissingCombatant(CombatantKey),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// Any other handler-specific failure.
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    /// Create a malformed-data error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Why the guest skipped an update message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesyncError {
    /// The message kind is not part of the protocol.
    #[error("unknown update kind `{0}`")]
    UnknownKind(String),

    /// The payload does not match the kind's schema.
    #[error("bad payload for `{kind}`: {reason}")]
    BadPayload { kind: String, reason: String },

    /// The payload names a combatant the mirror does not have.
    #[error("combatant {0} not found")]
    MissingCombatant(CombatantKey),

    /// A `handler_activated` message names a handler the guest never registered.
    #[error("handler `{0}` is not registered")]
    UnknownHandler(String),

    /// A sequence gap: at least one earlier message was missed.
    #[error("expected seq {expected}, got {got}")]
    OutOfOrder { expected: u64, got: u64 },

    /// The battle is authoritative and does not accept updates.
    #[error("updates can only be applied to a guest mirror")]
    NotMirror,

    /// The local handler refused to replay the summary.
    #[error("replay rejected: {0}")]
    Rejected(#[from] HandlerError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AbsoluteSide, Position};

    #[test]
    fn test_messages() {
        let key = CombatantKey::hero(AbsoluteSide::Guest, Position::Left);
        assert_eq!(
            DesyncError::MissingCombatant(key).to_string(),
            "combatant guest/left not found"
        );
        assert_eq!(
            HandlerError::ResourceUnavailable("deck").to_string(),
            "resource unavailable: deck"
        );
        assert_eq!(
            DesyncError::OutOfOrder { expected: 3, got: 5 }.to_string(),
            "expected seq 3, got 5"
        );
    }

    #[test]
    fn test_rejected_from_handler_error() {
        let err: DesyncError = HandlerError::malformed("no target").into();
        assert!(matches!(err, DesyncError::Rejected(HandlerError::Malformed(_))));
    }
}
