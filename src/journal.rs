//! Append-only history files
//!
//! One `Journal` is shared by every room in the process. Each room writes
//! its envelopes, one per line, to `chat_history_<port>.txt` inside the
//! history directory and seeds its ring from the same file on startup.
//! All file access goes through a single process-wide lock.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::JournalError;
use crate::frame::Frame;
use crate::history::History;

/// Persistence service for room histories
#[derive(Debug)]
pub struct Journal {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl Journal {
    /// Create a journal writing under `dir`
    ///
    /// The directory is created lazily on first append.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    /// History file for the room bound to `port`
    pub fn history_path(&self, port: u16) -> PathBuf {
        self.dir.join(format!("chat_history_{}.txt", port))
    }

    /// Append one envelope as a line
    pub fn append(&self, port: u16, envelope: &Frame) -> Result<(), JournalError> {
        let path = self.history_path(port);
        let _guard = self.lock.lock();

        let io_err = |source| JournalError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        let mut line = Vec::with_capacity(envelope.len() + 1);
        line.extend_from_slice(envelope.content());
        line.push(b'\n');
        file.write_all(&line).map_err(io_err)
    }

    /// Load a room's persisted history, keeping the last `capacity` lines
    ///
    /// A missing file yields an empty history.
    pub fn load(&self, port: u16, capacity: usize) -> Result<History, JournalError> {
        let path = self.history_path(port);
        let _guard = self.lock.lock();

        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No history file at {}", path.display());
                return Ok(History::new(capacity));
            }
            Err(source) => return Err(JournalError::Io { path, source }),
        };

        let mut frames = Vec::new();
        for line in BufReader::new(file).split(b'\n') {
            let mut line = line.map_err(|source| JournalError::Io {
                path: path.clone(),
                source,
            })?;
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            frames.push(Frame::from_bytes(&line));
        }

        Ok(History::from_frames(capacity, frames))
    }
}
