//! Fan-out of one message to every other joined connection.
//!
//! A broadcast works from a registry snapshot, so the registry lock is
//! released before any socket is touched. Writes happen one recipient at a
//! time. A recipient whose write fails is considered dead and is removed
//! through `Registry::remove`, which is the only membership mutation this
//! module performs. Delivery to the remaining recipients continues.

use std::time::Duration;

use tracing::debug;

use parley_core::ConnectionId;

use crate::registry::Registry;

/// Outcome of a single broadcast call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Recipients the message was written to.
    pub delivered: usize,

    /// Recipients whose write failed and that were removed from the registry.
    pub pruned: Vec<ConnectionId>,
}

/// Delivers messages to registry members.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Registry,
    write_timeout: Duration,
}

impl Broadcaster {
    pub fn new(registry: Registry, write_timeout: Duration) -> Self {
        Self {
            registry,
            write_timeout,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Sends `message` to every member except `exclude`.
    ///
    /// Best effort and at most once: failed writes are not retried, and
    /// members that join after the snapshot is taken are not visited.
    pub async fn broadcast(&self, message: &[u8], exclude: Option<ConnectionId>) -> BroadcastReport {
        let recipients = self.registry.snapshot().await;
        let mut report = BroadcastReport::default();

        for record in recipients {
            if Some(record.id()) == exclude {
                continue;
            }

            match record.writer().send(message, self.write_timeout).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(
                        connection = %record.id(),
                        peer = %record.peer_addr(),
                        username = %record.username(),
                        error = %e,
                        "Failed to deliver broadcast, removing connection"
                    );
                    self.registry.remove(record.id()).await;
                    report.pruned.push(record.id());
                }
            }
        }

        report
    }
}
