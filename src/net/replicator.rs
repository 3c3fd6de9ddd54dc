//! Host-side send path.
//!
//! The replicator stamps each payload with the next sequence number and
//! hands it to the transport synchronously with the mutation it describes.
//! After `battle_ended` it is muted: nothing else leaves the host.
//!
//! On a guest mirror the same `next_seq` field tracks the sequence number
//! the mirror expects next.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::message::{Payload, UpdateMessage};
use super::transport::{NullTransport, Transport};

/// Checkpointable part of the replicator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReplicationState {
    pub next_seq: u64,
    pub muted: bool,
}

/// Sequencing and delivery of update messages.
pub struct Replicator {
    transport: Box<dyn Transport>,
    state: ReplicationState,
    sent: Vec<UpdateMessage>,
}

impl std::fmt::Debug for Replicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replicator")
            .field("state", &self.state)
            .field("pending", &self.sent.len())
            .finish()
    }
}

impl Default for Replicator {
    fn default() -> Self {
        Self::new(Box::new(NullTransport))
    }
}

impl Replicator {
    /// Create a replicator sending through `transport`.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            state: ReplicationState::default(),
            sent: Vec::new(),
        }
    }

    /// Encode and send one payload.
    ///
    /// Returns the message as sent, or `None` when muted or when the payload
    /// could not be encoded (logged; the mutation itself already happened).
    pub fn send<P: Payload>(&mut self, payload: &P) -> Option<UpdateMessage> {
        if self.state.muted {
            debug!(kind = P::KIND, "replicator muted, update dropped");
            return None;
        }

        let message = match UpdateMessage::encode(payload, self.state.next_seq) {
            Ok(message) => message,
            Err(err) => {
                warn!(kind = P::KIND, %err, "update could not be encoded");
                return None;
            }
        };
        self.state.next_seq += 1;

        if let Err(err) = self.transport.send(&message) {
            warn!(kind = P::KIND, seq = message.seq, %err, "transport failed");
        }
        debug!(kind = P::KIND, seq = message.seq, "update sent");

        self.sent.push(message.clone());
        Some(message)
    }

    /// Take the messages sent since the last call.
    pub fn take_sent(&mut self) -> Vec<UpdateMessage> {
        std::mem::take(&mut self.sent)
    }

    /// Stop sending; used once the battle has ended.
    pub fn mute(&mut self) {
        self.state.muted = true;
    }

    /// Sequence number the next message will carry (host), or the next one
    /// expected (guest).
    #[must_use]
    pub fn next_seq(&self) -> u64 {
        self.state.next_seq
    }

    /// Advance the expected sequence number past `seq` (guest).
    pub fn acknowledge(&mut self, seq: u64) {
        self.state.next_seq = self.state.next_seq.max(seq + 1);
    }

    /// Checkpoint export.
    #[must_use]
    pub fn state(&self) -> ReplicationState {
        self.state
    }

    /// Checkpoint import.
    pub fn restore(&mut self, state: ReplicationState) {
        self.state = state;
        self.sent.clear();
    }
}
