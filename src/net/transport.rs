//! Transport collaborators.
//!
//! The core assumes in-order, reliable delivery; the transport owns the
//! actual guarantees. Two implementations ship with the crate:
//!
//! - [`MessageLog`]: shared in-memory log, handy for tests and for replaying
//!   a recorded battle into a guest mirror
//! - `mpsc::Sender<UpdateMessage>`: hand messages to another thread

use std::sync::{mpsc, Arc, Mutex};

use thiserror::Error;

use super::message::UpdateMessage;

/// Delivery failure reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The receiving end is gone.
    #[error("transport disconnected")]
    Disconnected,
}

/// Delivers host updates to the other client.
pub trait Transport: Send {
    /// Send one message. Must preserve call order.
    fn send(&mut self, message: &UpdateMessage) -> Result<(), TransportError>;
}

/// Discards everything. Used by guest mirrors, which never send.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn send(&mut self, _message: &UpdateMessage) -> Result<(), TransportError> {
        Ok(())
    }
}

impl Transport for mpsc::Sender<UpdateMessage> {
    fn send(&mut self, message: &UpdateMessage) -> Result<(), TransportError> {
        mpsc::Sender::send(self, message.clone()).map_err(|_| TransportError::Disconnected)
    }
}

/// Shared, cloneable in-memory message log.
///
/// Clones share the same storage, so a test can keep one handle while the
/// `Battle` owns another.
#[derive(Clone, Debug, Default)]
pub struct MessageLog {
    entries: Arc<Mutex<Vec<UpdateMessage>>>,
}

impl MessageLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every message sent so far.
    #[must_use]
    pub fn messages(&self) -> Vec<UpdateMessage> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Remove and return every message sent so far.
    pub fn drain(&self) -> Vec<UpdateMessage> {
        match self.entries.lock() {
            Ok(mut entries) => std::mem::take(&mut *entries),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    /// Messages of one kind, in send order.
    #[must_use]
    pub fn of_kind(&self, kind: &str) -> Vec<UpdateMessage> {
        self.messages().into_iter().filter(|m| m.kind == kind).collect()
    }

    /// Number of messages sent so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages().len()
    }

    /// Has nothing been sent?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Transport for MessageLog {
    fn send(&mut self, message: &UpdateMessage) -> Result<(), TransportError> {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(message.clone()),
            Err(poisoned) => poisoned.into_inner().push(message.clone()),
        }
        Ok(())
    }
}
