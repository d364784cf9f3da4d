//! Session handler for individual client connections.
//!
//! Each accepted connection gets its own `SessionHandler` that:
//! - Prompts for and reads a username
//! - Joins the registry and announces the new member
//! - Relays every received chunk to the other members
//! - Leaves the registry and announces the departure
//!
//! # Lifecycle
//!
//! ```text
//! Connecting ──prompt──▶ Handshaking ──username──▶ Active ──EOF/error──▶ Closing ──▶ Closed
//!                             │                                            ▲
//!                             └────────────── EOF/error ───────────────────┘
//! ```
//!
//! Teardown runs once per session whichever way `Closing` is reached. Once
//! a client has joined, a `Membership` guard owns the "joined" state: the
//! normal path consumes it, and if the session future unwinds or is dropped
//! while still joined, the guard schedules the same leave routine from its
//! `Drop` impl.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Session errors are logged and end in a normal teardown

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use parley_core::{ConnectionId, ConnectionInfo, Username};
use parley_protocol::{decode_chunk, ServerMessage};

use crate::broadcast::Broadcaster;
use crate::config::ServerConfig;
use crate::registry::{ConnectionRecord, ConnectionWriter, DeliveryError};

/// Position of a session in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Handshaking,
    Active,
    Closing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What happened during one session, returned when it ends.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,

    /// Set once the handshake completed
    pub username: Option<Username>,

    /// Chunks read from the client and broadcast to others
    pub messages_relayed: u64,

    pub final_state: SessionState,

    /// Time between joining and teardown; `None` if the client never joined
    pub connected_for: Option<Duration>,

    /// Error that moved the session to `Closing`, if any
    pub error: Option<SessionError>,
}

/// Drives one client connection from accept to close.
pub struct SessionHandler<R> {
    id: ConnectionId,
    peer_addr: SocketAddr,

    /// Read half of the connection
    reader: R,

    /// Write half, shared with the registry once joined
    writer: ConnectionWriter,

    broadcaster: Broadcaster,
    write_timeout: Duration,

    /// Single receive buffer; one read never exceeds its length
    buffer: Vec<u8>,

    state: SessionState,
    username: Option<Username>,
    messages_relayed: u64,
    connected_for: Option<Duration>,
}

impl<R> SessionHandler<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Creates a handler for a freshly accepted connection.
    ///
    /// # Arguments
    ///
    /// * `id` - Identity assigned by the acceptor
    /// * `peer_addr` - Remote address, used for logging and fallback names
    /// * `reader` - Read half of the connection
    /// * `writer` - Write half of the connection
    /// * `broadcaster` - Broadcaster bound to the shared registry
    /// * `config` - Chunk size and write timeout
    pub fn new(
        id: ConnectionId,
        peer_addr: SocketAddr,
        reader: R,
        writer: ConnectionWriter,
        broadcaster: Broadcaster,
        config: &ServerConfig,
    ) -> Self {
        Self {
            id,
            peer_addr,
            reader,
            writer,
            broadcaster,
            write_timeout: config.write_timeout,
            buffer: vec![0; config.read_chunk_size.max(1)],
            state: SessionState::Connecting,
            username: None,
            messages_relayed: 0,
            connected_for: None,
        }
    }

    /// Runs the session to completion.
    ///
    /// Never returns an error: failures are logged, recorded in the summary
    /// and turned into a normal teardown.
    pub async fn run(mut self) -> SessionSummary {
        info!(
            connection = %self.id,
            peer = %self.peer_addr,
            "[NEW CONNECTION] {} connected",
            self.peer_addr
        );

        let mut membership = None;
        let error = match self.drive(&mut membership).await {
            Ok(()) => None,
            Err(SessionError::HandshakeClosed) => {
                debug!(connection = %self.id, "Client closed before sending a username");
                Some(SessionError::HandshakeClosed)
            }
            Err(e) => {
                warn!(
                    connection = %self.id,
                    peer = %self.peer_addr,
                    error = %e,
                    "[ERROR] {}: {e}",
                    self.peer_addr
                );
                Some(e)
            }
        };

        self.teardown(membership).await;

        SessionSummary {
            id: self.id,
            peer_addr: self.peer_addr,
            username: self.username,
            messages_relayed: self.messages_relayed,
            final_state: self.state,
            connected_for: self.connected_for,
            error,
        }
    }

    /// Handshake followed by the receive loop.
    ///
    /// `membership` is filled in as soon as the record is in the registry so
    /// that `run` can hand it to teardown whatever happens afterwards.
    async fn drive(&mut self, membership: &mut Option<Membership>) -> Result<(), SessionError> {
        self.transition(SessionState::Handshaking);
        self.send(&ServerMessage::Prompt).await?;

        let username = self.read_username().await?;
        self.username = Some(username.clone());

        self.transition(SessionState::Active);
        let registry = self.broadcaster.registry().clone();
        let info = ConnectionInfo::new(self.id, self.peer_addr, username.clone());
        let record = ConnectionRecord::new(info, self.writer.clone());
        let joined_info = record.info().clone();
        registry.add(record).await;
        *membership = Some(Membership::new(self.broadcaster.clone(), joined_info));

        let joined = ServerMessage::joined(&username);
        info!(connection = %self.id, username = %username, "{joined}");
        self.broadcaster
            .broadcast(&joined.to_bytes(), Some(self.id))
            .await;

        let online = registry.len().await;
        self.send(&ServerMessage::welcome(online)).await?;

        self.relay_messages(&username).await
    }

    /// Reads the single handshake chunk and derives the username from it.
    async fn read_username(&mut self) -> Result<Username, SessionError> {
        let n = self.read_chunk().await?;
        if n == 0 {
            return Err(SessionError::HandshakeClosed);
        }

        let raw = decode_chunk(self.buffer.get(..n).unwrap_or_default());
        Ok(Username::from_handshake(&raw, self.peer_addr.port()))
    }

    /// Relays chunks until the client closes its side.
    async fn relay_messages(&mut self, username: &Username) -> Result<(), SessionError> {
        loop {
            let n = self.read_chunk().await?;
            if n == 0 {
                debug!(connection = %self.id, "Client sent EOF");
                return Ok(());
            }

            let text = decode_chunk(self.buffer.get(..n).unwrap_or_default()).into_owned();
            let line = ServerMessage::chat(username, text);
            info!(connection = %self.id, "{line}");

            let report = self.broadcaster.broadcast(&line.to_bytes(), Some(self.id)).await;
            self.messages_relayed += 1;

            debug!(
                connection = %self.id,
                delivered = report.delivered,
                pruned = report.pruned.len(),
                "Relayed message"
            );
        }
    }

    /// Closing → Closed: leave the registry, announce it, close the handle.
    async fn teardown(&mut self, membership: Option<Membership>) {
        self.transition(SessionState::Closing);

        if let Some(membership) = membership {
            self.connected_for = Some(membership.info.connected_for());
            membership.leave().await;
        }
        self.writer.close().await;

        self.transition(SessionState::Closed);
        info!(
            connection = %self.id,
            peer = %self.peer_addr,
            messages = self.messages_relayed,
            duration = ?self.connected_for,
            "[DISCONNECTED] {} disconnected",
            self.peer_addr
        );
    }

    async fn read_chunk(&mut self) -> Result<usize, SessionError> {
        self.reader
            .read(&mut self.buffer)
            .await
            .map_err(|e| SessionError::Read(e.to_string()))
    }

    async fn send(&self, msg: &ServerMessage) -> Result<(), SessionError> {
        self.writer
            .send(&msg.to_bytes(), self.write_timeout)
            .await
            .map_err(SessionError::from)
    }

    fn transition(&mut self, next: SessionState) {
        debug!(connection = %self.id, from = %self.state, to = %next, "Session state change");
        self.state = next;
    }
}

// ============================================================================
// Membership Guard
// ============================================================================

/// Proof that a session is in the registry.
///
/// `leave` performs the departure on the normal path. Dropping the guard
/// without calling `leave` schedules the same departure on the runtime.
struct Membership {
    broadcaster: Broadcaster,
    info: ConnectionInfo,
    left: bool,
}

impl Membership {
    fn new(broadcaster: Broadcaster, info: ConnectionInfo) -> Self {
        Self {
            broadcaster,
            info,
            left: false,
        }
    }

    async fn leave(mut self) {
        self.left = true;
        announce_departure(&self.broadcaster, &self.info).await;
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        if self.left {
            return;
        }
        self.left = true;

        let broadcaster = self.broadcaster.clone();
        let info = self.info.clone();

        match Handle::try_current() {
            Ok(handle) => {
                warn!(connection = %info.id, "Session ended without teardown, scheduling leave");
                handle.spawn(async move {
                    announce_departure(&broadcaster, &info).await;
                });
            }
            Err(_) => {
                warn!(connection = %info.id, "No runtime available to announce departure");
            }
        }
    }
}

/// Removes the member and tells everyone still connected.
async fn announce_departure(broadcaster: &Broadcaster, info: &ConnectionInfo) {
    broadcaster.registry().remove(info.id).await;

    let left = ServerMessage::left(&info.username);
    info!(
        connection = %info.id,
        username = %info.username,
        duration = ?info.connected_for(),
        "{left}"
    );
    broadcaster.broadcast(&left.to_bytes(), None).await;
}

/// Errors that end a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Connection closed during handshake")]
    HandshakeClosed,

    #[error("Read error: {0}")]
    Read(String),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}
