//! Connection identity and the informational half of a connection record.

use std::fmt;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};

use crate::Username;

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Identity of one accepted connection.
///
/// Assigned by the acceptor from a monotonically increasing counter, so two
/// live connections never share an id. Registry membership is keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

impl From<u64> for ConnectionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ============================================================================
// Connection Info
// ============================================================================

/// Immutable facts about a client that completed the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    pub username: Username,
    pub connected_at: DateTime<Utc>,
}

impl ConnectionInfo {
    /// Creates connection info stamped with the current time.
    pub fn new(id: ConnectionId, peer_addr: SocketAddr, username: Username) -> Self {
        Self {
            id,
            peer_addr,
            username,
            connected_at: Utc::now(),
        }
    }

    /// Time elapsed since the handshake completed.
    ///
    /// Clamped to zero if the wall clock moved backwards.
    pub fn connected_for(&self) -> std::time::Duration {
        Utc::now()
            .signed_duration_since(self.connected_at)
            .to_std()
            .unwrap_or_default()
    }
}
