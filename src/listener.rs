//! Per-port TCP listener
//!
//! Accepts connections forever and binds each one to the listener's room.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{error, info};

use crate::connection::Connection;
use crate::server::RoomHandle;

/// Pause after a failed accept before re-arming (e.g. out of descriptors)
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Accept loop for one port and its room
pub struct Listener {
    listener: TcpListener,
    room: RoomHandle,
}

impl Listener {
    /// Bind to `addr` and serve `room`
    pub async fn bind(addr: impl ToSocketAddrs, room: RoomHandle) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, room })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the accept loop
    ///
    /// A failed accept is logged and retried after a short pause. Each connection
    /// runs in its own task, so a panic there cannot reach this loop.
    pub async fn run(self) {
        info!("[{}] Accepting connections", self.room.port());

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("[{}] New connection from {}", self.room.port(), addr);
                    let connection = Connection::new(self.room.clone());
                    tokio::spawn(connection.run(stream));
                }
                Err(e) => {
                    error!("[{}] Failed to accept connection: {}", self.room.port(), e);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }
    }
}
