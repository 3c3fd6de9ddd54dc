//! Update messages: the unit of replication.
//!
//! Every authoritative mutation on the host becomes one [`UpdateMessage`]
//! whose `payload` carries everything the guest needs to reproduce it.
//! Payloads are typed on both ends through the [`Payload`] trait; the wire
//! form is a kind string plus a JSON object.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{BattleError, DesyncError};

/// A typed message payload with a fixed wire kind.
pub trait Payload: Serialize + DeserializeOwned {
    /// Wire name of the message kind.
    const KIND: &'static str;
}

/// One replicated update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateMessage {
    pub kind: String,
    pub payload: Value,
    /// Milliseconds since the Unix epoch when the host sent the message.
    /// Informational only; never feeds back into game logic.
    #[serde(default)]
    pub timestamp: u64,
    /// Per-battle sequence number, starting at 0.
    #[serde(default)]
    pub seq: u64,
}

impl UpdateMessage {
    /// Create a message from an untyped payload, stamped with the current time.
    pub fn new(kind: impl Into<String>, payload: Value, seq: u64) -> Self {
        Self {
            kind: kind.into(),
            payload,
            timestamp: now_millis(),
            seq,
        }
    }

    /// Encode a typed payload.
    pub fn encode<P: Payload>(payload: &P, seq: u64) -> Result<Self, BattleError> {
        let value = serde_json::to_value(payload).map_err(|source| BattleError::Payload {
            kind: P::KIND.to_string(),
            source,
        })?;
        Ok(Self::new(P::KIND, value, seq))
    }

    /// Decode the payload as `P`. Fails when the kind does not match or the
    /// payload does not fit the schema.
    pub fn decode<P: Payload>(&self) -> Result<P, DesyncError> {
        if self.kind != P::KIND {
            return Err(DesyncError::BadPayload {
                kind: self.kind.clone(),
                reason: format!("expected `{}`", P::KIND),
            });
        }
        serde_json::from_value(self.payload.clone()).map_err(|err| DesyncError::BadPayload {
            kind: self.kind.clone(),
            reason: err.to_string(),
        })
    }

    /// Is this message of payload type `P`?
    #[must_use]
    pub fn is<P: Payload>(&self) -> bool {
        self.kind == P::KIND
    }

    /// Serialize for the wire.
    pub fn to_json(&self) -> Result<String, BattleError> {
        serde_json::to_string(self).map_err(|source| BattleError::Payload {
            kind: self.kind.clone(),
            source,
        })
    }

    /// Parse from the wire.
    pub fn from_json(json: &str) -> Result<Self, DesyncError> {
        serde_json::from_str(json).map_err(|err| DesyncError::BadPayload {
            kind: "<unparsed>".to_string(),
            reason: err.to_string(),
        })
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
