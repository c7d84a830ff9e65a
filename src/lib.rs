//! Multi-port Broadcast Chat Server Library
//!
//! Clients connect over TCP, send a fixed-size nickname frame and then
//! exchange fixed-size message frames. Every message is stamped, stored in
//! the room's history and fanned out to everyone connected to the same port.
//!
//! # Features
//! - One room per configured port, fully isolated
//! - Fixed-width framing shared by client and server
//! - Bounded history replayed to new joiners, persisted per room
//! - Per-connection ordered write queue
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `RoomServer` is the per-port actor owning the registry and history
//! - Each connection runs a read task and a write task talking to its room
//! - No locks around room state - all access goes through message passing
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use portchat::{Journal, Listener, RoomServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let journal = Arc::new(Journal::new("."));
//!     let room = RoomServer::open(1000, journal);
//!     let listener = Listener::bind("0.0.0.0:1000", room).await.unwrap();
//!     listener.run().await;
//! }
//! ```

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod history;
pub mod journal;
pub mod listener;
pub mod participant;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use config::ServerConfig;
pub use connection::{Connection, ConnectionState, Handshake};
pub use error::{AppError, ConfigError, ConnectionError, JournalError, RoomError};
pub use frame::{nickname_frame, Frame, Nickname, FRAME_CAPACITY, FRAME_SIZE, NICKNAME_SIZE};
pub use history::{History, HISTORY_CAPACITY};
pub use journal::Journal;
pub use listener::Listener;
pub use participant::{Outbox, Participant};
pub use room::Room;
pub use server::{RoomCommand, RoomHandle, RoomServer};
pub use types::ParticipantId;
