//! Room struct definition
//!
//! A broadcast domain bound to one listening port: registry of
//! participants plus the history ring. `Room` itself is plain data with
//! synchronous methods; `server::RoomServer` runs it inside an actor so
//! every call is serialized.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::frame::{Frame, Nickname};
use crate::history::History;
use crate::journal::Journal;
use crate::participant::Participant;
use crate::types::ParticipantId;

/// Timestamp prefix of every envelope, trailing space included
const TIMESTAMP_FORMAT: &str = "[%Y-%m-%d %H:%M:%S] ";

/// Current local time formatted as an envelope prefix
pub fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// A registered participant
#[derive(Debug)]
struct Member {
    participant: Arc<dyn Participant>,
    nickname: Nickname,
}

/// Broadcast room
///
/// Participants are held by reference-counted handle only while
/// registered. Nicknames need not be unique.
#[derive(Debug)]
pub struct Room {
    /// Port this room is bound to
    pub port: u16,
    /// Registered participants: ParticipantId -> Member
    members: HashMap<ParticipantId, Member>,
    /// Recent envelopes replayed to joiners
    history: History,
    /// Shared persistence service
    journal: Arc<Journal>,
}

impl Room {
    /// Create a room with a (possibly pre-seeded) history
    pub fn new(port: u16, history: History, journal: Arc<Journal>) -> Self {
        Self {
            port,
            members: HashMap::new(),
            history,
            journal,
        }
    }

    /// Register a participant and replay the history to it, oldest first
    pub fn enter(
        &mut self,
        id: ParticipantId,
        participant: Arc<dyn Participant>,
        nickname: Nickname,
    ) {
        for envelope in self.history.iter() {
            participant.on_message(envelope);
        }

        info!(
            "[{}] {} entered ({} replayed)",
            self.port,
            nickname,
            self.history.len()
        );
        self.members.insert(
            id,
            Member {
                participant,
                nickname,
            },
        );
        debug!("[{}] Participants: {}", self.port, self.members.len());
    }

    /// Remove a participant
    ///
    /// Returns false if it was not registered (duplicate leave).
    pub fn leave(&mut self, id: ParticipantId) -> bool {
        match self.members.remove(&id) {
            Some(member) => {
                info!("[{}] {} left", self.port, member.nickname);
                debug!("[{}] Participants: {}", self.port, self.members.len());
                true
            }
            None => {
                debug!("[{}] Ignoring leave of unknown participant {}", self.port, id);
                false
            }
        }
    }

    /// Broadcast a message frame stamped with the current local time
    pub fn broadcast(&mut self, frame: &Frame, sender: ParticipantId) -> Frame {
        self.broadcast_at(frame, sender, &timestamp())
    }

    /// Broadcast a message frame with an explicit timestamp prefix
    ///
    /// Formats the envelope, records it in the history, persists it and
    /// delivers it to every registered participant, sender included.
    /// Persistence failures are logged and otherwise ignored.
    pub fn broadcast_at(&mut self, frame: &Frame, sender: ParticipantId, timestamp: &str) -> Frame {
        let nickname = self.nickname(sender);
        let envelope = Frame::envelope(timestamp, &nickname, frame);

        self.history.push(envelope.clone());
        info!("[{}] Message from {}{}", self.port, nickname, frame.text());

        if let Err(e) = self.journal.append(self.port, &envelope) {
            warn!("[{}] Failed to persist message: {}", self.port, e);
        }

        for member in self.members.values() {
            member.participant.on_message(&envelope);
        }
        envelope
    }

    /// Nickname of a participant, or an empty nickname if not registered
    pub fn nickname(&self, id: ParticipantId) -> Nickname {
        self.members
            .get(&id)
            .map(|m| m.nickname.clone())
            .unwrap_or_default()
    }

    /// Check if a participant is registered
    pub fn contains(&self, id: ParticipantId) -> bool {
        self.members.contains_key(&id)
    }

    /// Get the number of registered participants
    pub fn participant_count(&self) -> usize {
        self.members.len()
    }

    /// Retained envelopes, oldest first
    pub fn history(&self) -> &History {
        &self.history
    }
}
