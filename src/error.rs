//! Error types for the chat server
//!
//! Defines startup errors, connection close reasons, room and
//! persistence errors. Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Application-level errors
///
/// Only raised during startup; once serving, errors stay local to the
/// connection or room that hit them.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded (fatal)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error while binding a port or building the runtime (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file missing or unreadable
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Config file is not valid JSON for the expected shape
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    /// No ports to listen on
    #[error("no ports listed in configuration")]
    NoPorts,

    /// Worker pool must have at least one thread
    #[error("worker count must be at least 1")]
    InvalidWorkers,
}

/// Why a connection reached the `Closed` state
///
/// Every variant is handled by the connection itself; none of them
/// escape into the listener or the runtime.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Transport setup failed before the nickname was read
    #[error("handshake failed: {0}")]
    Handshake(#[source] std::io::Error),

    /// Peer closed the connection
    #[error("peer closed the connection")]
    PeerClosed,

    /// Read from the transport failed
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    /// Write to the transport failed
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),

    /// The room dropped this participant's outbound queue
    #[error("removed from room")]
    Evicted,

    /// The room actor is gone
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A connection task panicked or was cancelled
    #[error("connection task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ConnectionError {
    /// Classify a failed read: EOF means the peer hung up
    pub fn from_read(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::PeerClosed
        } else {
            Self::Read(err)
        }
    }
}

/// Room errors
///
/// Occurs when a command is sent to a room whose actor has stopped.
#[derive(Debug, Error)]
pub enum RoomError {
    /// The room's command channel has been closed
    #[error("room on port {0} is closed")]
    Closed(u16),
}

/// History persistence errors
///
/// Reported and swallowed by the room; never stop a broadcast.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("history file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
