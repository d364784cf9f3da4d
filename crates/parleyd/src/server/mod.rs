//! TCP acceptor for the relay.
//!
//! The server:
//! - Binds a TCP listener with address reuse enabled
//! - Spawns a `SessionHandler` task for each accepted client
//! - Keeps accepting while sessions run; accept never waits on a session
//! - Stops accepting when its `CancellationToken` is triggered
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ChatServer    │
//! │                 │
//! │  TcpListener    │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ SessionHandler  │────▶│    Registry     │
//! │  (per client)   │     │                 │
//! └─────────────────┘     └─────────────────┘
//!         │
//!         │ broadcast
//!         ▼
//! ┌─────────────────┐
//! │  Other clients  │
//! └─────────────────┘
//! ```
//!
//! Shutdown is best effort: the listener is closed but sessions already
//! running are not drained.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Accept errors are logged and allow continued operation

mod session;

pub use session::{SessionError, SessionHandler, SessionState, SessionSummary};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use parley_core::ConnectionId;

use crate::broadcast::Broadcaster;
use crate::config::ServerConfig;
use crate::registry::{ConnectionWriter, Registry};

/// Pending-connection queue length passed to `listen`.
const LISTEN_BACKLOG: u32 = 1024;

/// TCP server for the chat relay.
pub struct ChatServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
    broadcaster: Broadcaster,

    /// Cancellation token for shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating connection ids
    connection_counter: AtomicU64,

    /// Sessions whose task has not finished yet
    active_sessions: Arc<AtomicUsize>,
}

impl ChatServer {
    /// Resolves the configured address and binds the listening socket.
    ///
    /// # Arguments
    ///
    /// * `config` - Address to bind and per-session settings
    /// * `registry` - Shared registry the sessions join
    /// * `cancel_token` - Token for shutdown
    ///
    /// # Errors
    ///
    /// - `ServerError::Resolve` if the host does not resolve
    /// - `ServerError::SocketSetup` if the socket cannot be created or bound
    pub async fn bind(
        config: ServerConfig,
        registry: Registry,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let address = config.address();
        let addr = lookup_host(&address)
            .await
            .map_err(|e| ServerError::Resolve {
                address: address.clone(),
                error: e.to_string(),
            })?
            .next()
            .ok_or_else(|| ServerError::Resolve {
                address: address.clone(),
                error: "no addresses found".to_string(),
            })?;

        let listener = bind_listener(addr).map_err(|e| ServerError::SocketSetup {
            address: addr,
            error: e.to_string(),
        })?;
        let local_addr = listener.local_addr().map_err(|e| ServerError::SocketSetup {
            address: addr,
            error: e.to_string(),
        })?;

        info!(address = %local_addr, "[STARTING] Server is starting on {local_addr}");

        let broadcaster = Broadcaster::new(registry, config.write_timeout);

        Ok(Self {
            listener,
            local_addr,
            config,
            broadcaster,
            cancel_token,
            connection_counter: AtomicU64::new(0),
            active_sessions: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Address the listener is bound to (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of session tasks still running.
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// Runs the accept loop.
    ///
    /// Accepts connections until the cancellation token is triggered, then
    /// closes the listener and returns.
    pub async fn run(self) {
        info!(address = %self.local_addr, "[LISTENING] Server is listening for connections...");

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("[SHUTTING DOWN] Server is shutting down...");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            self.handle_connection(stream, peer_addr);
                        }
                        Err(e) => {
                            error!(error = %e, "[ERROR] Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        let still_running = self.active_sessions();
        drop(self.listener);
        info!(active = still_running, "[STOPPED] Server stopped");
    }

    /// Spawns a session task for a new client.
    fn handle_connection(&self, stream: TcpStream, peer_addr: SocketAddr) {
        let id = ConnectionId::new(self.connection_counter.fetch_add(1, Ordering::Relaxed));
        let (reader, writer) = stream.into_split();

        let handler = SessionHandler::new(
            id,
            peer_addr,
            reader,
            ConnectionWriter::new(writer),
            self.broadcaster.clone(),
            &self.config,
        );

        let active = ActiveSession::enter(Arc::clone(&self.active_sessions));
        info!(active = active.count, "[ACTIVE CONNECTIONS] {}", active.count);

        tokio::spawn(async move {
            let _active = active;
            let summary = handler.run().await;
            debug!(
                connection = %summary.id,
                username = ?summary.username.as_ref().map(|u| u.as_str()),
                messages = summary.messages_relayed,
                state = %summary.final_state,
                duration = ?summary.connected_for,
                error = ?summary.error,
                "Session finished"
            );
        });
    }
}

fn bind_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}

/// Keeps the active-session count accurate even if a session task panics.
struct ActiveSession {
    counter: Arc<AtomicUsize>,
    count: usize,
}

impl ActiveSession {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        let count = counter.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        Self { counter, count }
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to resolve {address}: {error}")]
    Resolve { address: String, error: String },

    #[error("Failed to setup socket at {address}: {error}")]
    SocketSetup { address: SocketAddr, error: String },
}
