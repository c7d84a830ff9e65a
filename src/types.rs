//! Participant identity
//!
//! Nicknames may repeat within a room, so the registry is keyed by a
//! random `ParticipantId` assigned when a connection is accepted. The id
//! also tags every log line about that connection.

use uuid::Uuid;

/// Registry key of one connection, stable from accept to close
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticipantId(pub Uuid);

impl ParticipantId {
    /// Fresh random id; collisions are not checked
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
