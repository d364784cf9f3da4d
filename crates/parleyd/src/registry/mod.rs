//! Registry of joined connections.
//!
//! The registry is the single piece of process-wide shared state in the
//! relay. It is created once in `main` and handed to the acceptor and every
//! session; there is no global.
//!
//! # Locking
//!
//! ```text
//! ┌─────────────────┐  add / remove   ┌───────────────────────────────┐
//! │ SessionHandler  │────────────────▶│ Mutex<HashMap<Id, Record>>    │
//! └─────────────────┘                 └───────────────┬───────────────┘
//! ┌─────────────────┐  snapshot()                     │ clone, unlock
//! │   Broadcaster   │◀────────────────────────────────┘
//! └────────┬────────┘
//!          │ write to each record's ConnectionWriter (lock not held)
//!          ▼
//! ```
//!
//! Exactly one lock guards membership. Critical sections only touch the map;
//! no network I/O happens while it is held.
//!
//! # Panic-Free Guarantees
//!
//! All operations are total: adding always succeeds and removing an absent
//! connection is a no-op.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use parley_core::ConnectionId;

mod record;

pub use record::{BoxedWriter, ConnectionRecord, ConnectionWriter, DeliveryError};

/// Shared set of connections between handshake completion and teardown.
///
/// Cheap to clone; all clones observe the same membership.
#[derive(Clone, Default)]
pub struct Registry {
    connections: Arc<Mutex<HashMap<ConnectionId, ConnectionRecord>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record. A record with the same id is replaced.
    pub async fn add(&self, record: ConnectionRecord) {
        let id = record.id();
        let mut connections = self.connections.lock().await;
        if connections.insert(id, record).is_some() {
            debug!(connection = %id, "Replaced existing registry entry");
        }
    }

    /// Removes a record, returning it if it was present.
    ///
    /// Safe to call from several cleanup paths for the same connection.
    pub async fn remove(&self, id: ConnectionId) -> Option<ConnectionRecord> {
        self.connections.lock().await.remove(&id)
    }

    /// Point-in-time copy of the current members.
    ///
    /// Records added or removed after this returns are not reflected in the
    /// returned vector.
    pub async fn snapshot(&self) -> Vec<ConnectionRecord> {
        self.connections.lock().await.values().cloned().collect()
    }

    /// Number of joined connections.
    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.lock().await.is_empty()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.lock().await.contains_key(&id)
    }
}
