//! Room actor implementation
//!
//! Each room runs as its own actor task that owns the `Room` state and
//! processes commands one at a time. That task is the room's strand:
//! enter, leave and broadcast never race, whatever worker thread the
//! calling connection runs on.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::error::RoomError;
use crate::frame::{Frame, Nickname};
use crate::history::HISTORY_CAPACITY;
use crate::journal::Journal;
use crate::participant::Participant;
use crate::room::Room;
use crate::types::ParticipantId;

/// Channel buffer size for room commands
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Commands sent from connections to a room actor
#[derive(Debug)]
pub enum RoomCommand {
    /// Register a participant and replay history to it
    Enter {
        id: ParticipantId,
        participant: Arc<dyn Participant>,
        nickname: Nickname,
    },
    /// Remove a participant (no-op if absent)
    Leave { id: ParticipantId },
    /// Broadcast a message frame from a participant
    Broadcast { id: ParticipantId, frame: Frame },
    /// Look up a participant's nickname
    Nickname {
        id: ParticipantId,
        reply: oneshot::Sender<Nickname>,
    },
    /// Snapshot the history ring
    History { reply: oneshot::Sender<Vec<Frame>> },
    /// Count registered participants
    ParticipantCount { reply: oneshot::Sender<usize> },
}

/// The room actor
///
/// Runs until every `RoomHandle` has been dropped.
pub struct RoomServer {
    /// Room state, only touched from `run`
    room: Room,
    /// Command receiver channel
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomServer {
    /// Create a room actor with the given command receiver
    pub fn new(room: Room, receiver: mpsc::Receiver<RoomCommand>) -> Self {
        Self { room, receiver }
    }

    /// Spawn the actor for `room` and return a handle to it
    pub fn spawn(room: Room) -> RoomHandle {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let handle = RoomHandle {
            port: room.port,
            sender: tx,
        };
        tokio::spawn(Self::new(room, rx).run());
        handle
    }

    /// Open the room for `port`, seeding its history from the journal
    ///
    /// An unreadable history file is reported and the room starts empty.
    pub fn open(port: u16, journal: Arc<Journal>) -> RoomHandle {
        let history = match journal.load(port, HISTORY_CAPACITY) {
            Ok(history) => history,
            Err(e) => {
                warn!("[{}] Failed to load history: {}", port, e);
                Default::default()
            }
        };
        info!("[{}] Room opened with {} messages of history", port, history.len());
        Self::spawn(Room::new(port, history, journal))
    }

    /// Run the room event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("[{}] Room started", self.room.port);

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("[{}] Room shutting down", self.room.port);
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Enter {
                id,
                participant,
                nickname,
            } => {
                self.room.enter(id, participant, nickname);
            }
            RoomCommand::Leave { id } => {
                self.room.leave(id);
            }
            RoomCommand::Broadcast { id, frame } => {
                self.room.broadcast(&frame, id);
            }
            RoomCommand::Nickname { id, reply } => {
                let _ = reply.send(self.room.nickname(id));
            }
            RoomCommand::History { reply } => {
                let _ = reply.send(self.room.history().snapshot());
            }
            RoomCommand::ParticipantCount { reply } => {
                let _ = reply.send(self.room.participant_count());
            }
        }
    }
}

/// Cloneable handle to a room actor
///
/// Commands from one handle are processed in the order they were sent.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    port: u16,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Port of the room behind this handle
    pub fn port(&self) -> u16 {
        self.port
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::Closed(self.port))
    }

    /// Register a participant; history replay happens before any later command
    pub async fn enter(
        &self,
        id: ParticipantId,
        participant: Arc<dyn Participant>,
        nickname: Nickname,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::Enter {
            id,
            participant,
            nickname,
        })
        .await
    }

    /// Remove a participant
    pub async fn leave(&self, id: ParticipantId) -> Result<(), RoomError> {
        self.send(RoomCommand::Leave { id }).await
    }

    /// Broadcast a frame on behalf of a participant
    pub async fn broadcast(&self, id: ParticipantId, frame: Frame) -> Result<(), RoomError> {
        self.send(RoomCommand::Broadcast { id, frame }).await
    }

    /// Nickname of a participant (empty if not registered)
    pub async fn nickname(&self, id: ParticipantId) -> Result<Nickname, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Nickname { id, reply }).await?;
        rx.await.map_err(|_| RoomError::Closed(self.port))
    }

    /// Snapshot of the room's history, oldest first
    pub async fn history(&self) -> Result<Vec<Frame>, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::History { reply }).await?;
        rx.await.map_err(|_| RoomError::Closed(self.port))
    }

    /// Number of registered participants
    pub async fn participant_count(&self) -> Result<usize, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::ParticipantCount { reply }).await?;
        rx.await.map_err(|_| RoomError::Closed(self.port))
    }
}
