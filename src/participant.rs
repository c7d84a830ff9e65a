//! Room participants
//!
//! A room only needs one capability from its members: accept an envelope.
//! Connections implement it with `Outbox`, a queue drained by their write
//! loop; other kinds of participant can implement the trait directly.

use std::fmt;

use tokio::sync::mpsc;
use tracing::debug;

use crate::frame::Frame;
use crate::types::ParticipantId;

/// Anything that can receive broadcast envelopes
///
/// Called from inside the room's serialized context, so implementations
/// must not block.
pub trait Participant: Send + Sync + fmt::Debug {
    /// Deliver one envelope to this participant
    fn on_message(&self, envelope: &Frame);
}

/// Outbound queue of a connection
///
/// Frames are queued in call order and written one at a time by the
/// connection's write loop. Dropping the outbox ends that loop.
#[derive(Debug)]
pub struct Outbox {
    /// Owner of the queue
    pub id: ParticipantId,
    /// Room → connection frame channel
    sender: mpsc::UnboundedSender<Frame>,
}

impl Outbox {
    /// Create an outbox and the receiving end for the write loop
    pub fn channel(id: ParticipantId) -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { id, sender }, receiver)
    }
}

impl Participant for Outbox {
    fn on_message(&self, envelope: &Frame) {
        if self.sender.send(envelope.clone()).is_err() {
            debug!("Write loop of {} already ended, frame dropped", self.id);
        }
    }
}
