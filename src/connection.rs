//! Client connection handler
//!
//! Drives one client through `Connecting → AwaitingNickname → Active →
//! Closed`. Once active, a read task feeds frames to the room and a write
//! task drains the connection's outbox, each with at most one transport
//! operation in flight. Every error path ends in `close`, which leaves the
//! room at most once.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::ConnectionError;
use crate::frame::{Frame, Nickname, FRAME_SIZE, NICKNAME_SIZE};
use crate::participant::Outbox;
use crate::server::RoomHandle;
use crate::types::ParticipantId;

/// Transport setup performed while `Connecting`
///
/// Returns a peer label for logging.
pub trait Handshake {
    fn handshake(&mut self) -> std::io::Result<String>;
}

impl Handshake for TcpStream {
    fn handshake(&mut self) -> std::io::Result<String> {
        self.set_nodelay(true)?;
        Ok(self.peer_addr()?.to_string())
    }
}

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport setup in progress
    Connecting,
    /// Waiting for the nickname frame
    AwaitingNickname,
    /// Registered in the room, read and write loops running
    Active,
    /// Terminal; no further I/O
    Closed,
}

/// One client connection bound to a room
///
/// The transport is handed to `run` and owned by the read and write
/// tasks; it is released when they end or are aborted.
pub struct Connection {
    id: ParticipantId,
    room: RoomHandle,
    state: ConnectionState,
    peer: String,
}

impl Connection {
    /// Create a connection bound to `room`
    pub fn new(room: RoomHandle) -> Self {
        Self {
            id: ParticipantId::new(),
            room,
            state: ConnectionState::Connecting,
            peer: "unknown".to_string(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Run the connection over `stream` to completion
    ///
    /// Never fails: the close reason is logged and returned.
    pub async fn run<S>(mut self, stream: S) -> ConnectionError
    where
        S: AsyncRead + AsyncWrite + Handshake + Send + 'static,
    {
        let reason = self.drive(stream).await;
        if self.close(&reason) {
            if let Err(e) = self.room.leave(self.id).await {
                debug!("Leave for {} not delivered: {}", self.id, e);
            }
        }
        reason
    }

    async fn drive<S>(&mut self, mut stream: S) -> ConnectionError
    where
        S: AsyncRead + AsyncWrite + Handshake + Send + 'static,
    {
        // Connecting
        match stream.handshake() {
            Ok(peer) => self.peer = peer,
            Err(e) => return ConnectionError::Handshake(e),
        }
        self.transition(ConnectionState::AwaitingNickname);

        let (mut reader, writer) = tokio::io::split(stream);
        let nickname = match read_nickname(&mut reader).await {
            Ok(nickname) => nickname,
            Err(e) => return e,
        };

        // Queue and write loop exist before entering so the replay has
        // somewhere to go
        let (outbox, queue) = Outbox::channel(self.id);
        let mut write_task = tokio::spawn(write_loop(writer, queue));

        info!("Client {} from {} is {}", self.id, self.peer, nickname);
        if let Err(e) = self.room.enter(self.id, Arc::new(outbox), nickname).await {
            write_task.abort();
            return e.into();
        }
        self.transition(ConnectionState::Active);

        let mut read_task = tokio::spawn(read_loop(reader, self.room.clone(), self.id));

        tokio::select! {
            result = &mut read_task => {
                debug!("Read task completed for {}", self.id);
                write_task.abort();
                result.unwrap_or_else(ConnectionError::from)
            }
            result = &mut write_task => {
                debug!("Write task completed for {}", self.id);
                read_task.abort();
                result.unwrap_or_else(ConnectionError::from)
            }
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!("Client {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }

    /// Move to `Closed`
    ///
    /// Returns true exactly once, and only if the room was entered, so
    /// the caller leaves the room at most once.
    fn close(&mut self, reason: &ConnectionError) -> bool {
        let previous = std::mem::replace(&mut self.state, ConnectionState::Closed);
        if previous == ConnectionState::Closed {
            return false;
        }

        match reason {
            ConnectionError::PeerClosed | ConnectionError::Evicted => {
                info!("Client {} ({}) disconnected: {}", self.id, self.peer, reason);
            }
            _ => {
                warn!("Client {} ({}) closed: {}", self.id, self.peer, reason);
            }
        }
        previous == ConnectionState::Active
    }
}

/// Read the nickname frame and format it
async fn read_nickname<R>(reader: &mut R) -> Result<Nickname, ConnectionError>
where
    R: AsyncRead + Unpin,
{
    let mut raw = [0u8; NICKNAME_SIZE];
    reader
        .read_exact(&mut raw)
        .await
        .map_err(ConnectionError::from_read)?;
    Ok(Nickname::from_wire(&raw))
}

/// Read frames forever, handing each to the room
///
/// The next read is issued as soon as the broadcast is queued.
async fn read_loop<R>(mut reader: R, room: RoomHandle, id: ParticipantId) -> ConnectionError
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; FRAME_SIZE];
    loop {
        if let Err(e) = reader.read_exact(&mut buf).await {
            return ConnectionError::from_read(e);
        }
        if let Err(e) = room.broadcast(id, Frame::from_wire(&buf)).await {
            return e.into();
        }
    }
}

/// Write queued frames in order, one at a time
///
/// Ends when the room drops the outbox or a write fails.
async fn write_loop<W>(mut writer: W, mut queue: mpsc::UnboundedReceiver<Frame>) -> ConnectionError
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = queue.recv().await {
        if let Err(e) = writer.write_all(frame.as_bytes()).await {
            return ConnectionError::Write(e);
        }
    }
    let _ = writer.shutdown().await;
    ConnectionError::Evicted
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;

    use tokio::io::{duplex, DuplexStream, ReadBuf};
    use tokio::time::timeout;

    use crate::frame::nickname_frame;
    use crate::history::History;
    use crate::journal::Journal;
    use crate::room::Room;
    use crate::server::RoomServer;

    const WAIT: Duration = Duration::from_secs(2);

    impl Handshake for DuplexStream {
        fn handshake(&mut self) -> io::Result<String> {
            Ok("in-memory".to_string())
        }
    }

    /// Transport whose setup always fails
    struct Refused(DuplexStream);

    impl Handshake for Refused {
        fn handshake(&mut self) -> io::Result<String> {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
        }
    }

    impl AsyncRead for Refused {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.0).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for Refused {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.0).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.0).poll_flush(cx)
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.0).poll_shutdown(cx)
        }
    }

    fn spawn_room(dir: &std::path::Path) -> RoomHandle {
        RoomServer::spawn(Room::new(1000, History::default(), Arc::new(Journal::new(dir))))
    }

    /// Connect an in-memory client and return its end of the pipe
    fn connect(room: &RoomHandle) -> (DuplexStream, tokio::task::JoinHandle<ConnectionError>) {
        let (client, server) = duplex(64 * 1024);
        let task = tokio::spawn(Connection::new(room.clone()).run(server));
        (client, task)
    }

    async fn send_frame(client: &mut DuplexStream, text: &str) {
        client
            .write_all(Frame::from_text(text).as_bytes())
            .await
            .unwrap();
    }

    async fn recv_frame(client: &mut DuplexStream) -> String {
        let mut buf = [0u8; FRAME_SIZE];
        timeout(WAIT, client.read_exact(&mut buf))
            .await
            .expect("timed out waiting for frame")
            .unwrap();
        Frame::from_wire(&buf).text().into_owned()
    }

    #[tokio::test]
    async fn test_close_leaves_only_once() {
        let tmp = tempfile::tempdir().unwrap();
        let room = spawn_room(tmp.path());
        let mut conn = Connection::new(room);
        assert_eq!(conn.state(), ConnectionState::Connecting);

        conn.transition(ConnectionState::Active);
        assert!(conn.close(&ConnectionError::PeerClosed));
        assert!(!conn.close(&ConnectionError::PeerClosed));
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_close_before_entering_skips_leave() {
        let tmp = tempfile::tempdir().unwrap();
        let room = spawn_room(tmp.path());
        let mut conn = Connection::new(room);

        conn.transition(ConnectionState::AwaitingNickname);
        assert!(!conn.close(&ConnectionError::PeerClosed));
    }

    #[tokio::test]
    async fn test_message_is_echoed_with_nickname() {
        let tmp = tempfile::tempdir().unwrap();
        let room = spawn_room(tmp.path());
        let (mut client, _task) = connect(&room);

        client.write_all(&nickname_frame("alice")).await.unwrap();
        send_frame(&mut client, "hi").await;

        let echo = recv_frame(&mut client).await;
        assert!(echo.starts_with('['));
        assert!(echo.ends_with("] alice: hi"));
    }

    #[tokio::test]
    async fn test_frames_arrive_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let room = spawn_room(tmp.path());
        let (mut client, _task) = connect(&room);

        client.write_all(&nickname_frame("bob")).await.unwrap();
        for i in 0..20 {
            send_frame(&mut client, &format!("msg {}", i)).await;
        }

        for i in 0..20 {
            let frame = recv_frame(&mut client).await;
            assert!(frame.ends_with(&format!("bob: msg {}", i)), "got {}", frame);
        }
    }

    #[tokio::test]
    async fn test_disconnect_before_nickname_skips_room() {
        let tmp = tempfile::tempdir().unwrap();
        let room = spawn_room(tmp.path());
        let (client, task) = connect(&room);

        drop(client);

        let reason = timeout(WAIT, task).await.unwrap().unwrap();
        assert!(matches!(reason, ConnectionError::PeerClosed));
        assert!(room.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_leaves_room() {
        let tmp = tempfile::tempdir().unwrap();
        let room = spawn_room(tmp.path());

        let (mut alice, alice_task) = connect(&room);
        alice.write_all(&nickname_frame("alice")).await.unwrap();
        send_frame(&mut alice, "bye").await;
        recv_frame(&mut alice).await;
        drop(alice);

        let reason = timeout(WAIT, alice_task).await.unwrap().unwrap();
        assert!(matches!(reason, ConnectionError::PeerClosed));

        let (mut bob, _bob_task) = connect(&room);
        bob.write_all(&nickname_frame("bob")).await.unwrap();
        assert!(recv_frame(&mut bob).await.ends_with("alice: bye"));
        send_frame(&mut bob, "anyone?").await;
        assert!(recv_frame(&mut bob).await.ends_with("bob: anyone?"));
    }

    #[tokio::test]
    async fn test_failed_handshake_skips_room() {
        let tmp = tempfile::tempdir().unwrap();
        let room = spawn_room(tmp.path());
        let (mut client, server) = duplex(1024);

        // A nickname is waiting but must never be read
        client.write_all(&nickname_frame("mallory")).await.unwrap();

        let reason = Connection::new(room.clone()).run(Refused(server)).await;
        assert!(matches!(reason, ConnectionError::Handshake(_)));
        assert_eq!(room.participant_count().await.unwrap(), 0);
        assert!(room.history().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_broadcasts_share_one_order() {
        const CLIENTS: usize = 8;
        const MESSAGES: usize = 50;
        const TOTAL: usize = CLIENTS * MESSAGES;

        let tmp = tempfile::tempdir().unwrap();
        let room = spawn_room(tmp.path());

        let mut clients = Vec::new();
        for i in 0..CLIENTS {
            let (mut client, _task) = connect(&room);
            client.write_all(&nickname_frame(&format!("c{}", i))).await.unwrap();
            clients.push(client);
        }

        // Everyone registered before the first broadcast
        timeout(WAIT, async {
            while room.participant_count().await.unwrap() < CLIENTS {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("clients did not all enter");

        let mut readers = Vec::new();
        for (i, client) in clients.into_iter().enumerate() {
            let (mut reader, mut writer) = tokio::io::split(client);
            tokio::spawn(async move {
                for j in 0..MESSAGES {
                    let frame = Frame::from_text(&format!("m{}-{}", i, j));
                    writer.write_all(frame.as_bytes()).await.unwrap();
                }
                // Keep the write half open until the test ends
                std::future::pending::<()>().await;
            });
            readers.push(tokio::spawn(async move {
                let mut seen = Vec::with_capacity(TOTAL);
                let mut buf = [0u8; FRAME_SIZE];
                for _ in 0..TOTAL {
                    timeout(WAIT, reader.read_exact(&mut buf))
                        .await
                        .expect("timed out waiting for frame")
                        .unwrap();
                    let text = Frame::from_wire(&buf).text().into_owned();
                    // Drop the timestamp prefix, which may differ per second
                    seen.push(text.split("] ").nth(1).unwrap_or_default().to_string());
                }
                seen
            }));
        }

        let mut orders = Vec::new();
        for reader in readers {
            orders.push(reader.await.unwrap());
        }

        let first = &orders[0];
        let unique: HashSet<_> = first.iter().collect();
        assert_eq!(first.len(), TOTAL);
        assert_eq!(unique.len(), TOTAL);
        for order in &orders[1..] {
            assert_eq!(order, first);
        }
    }
}
