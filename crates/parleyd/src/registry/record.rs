//! Connection records and the shared write handle they carry.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Write failures are returned as `DeliveryError`, never raised

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

use parley_core::{ConnectionId, ConnectionInfo, Username};

/// Type-erased write half of a client connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

// ============================================================================
// Connection Writer
// ============================================================================

/// Shared handle for writing to one client.
///
/// The session handler owns the connection; the registry and any in-flight
/// broadcast hold clones of this handle. The inner mutex serialises whole
/// messages on one socket and is never taken while the registry lock is
/// held.
#[derive(Clone)]
pub struct ConnectionWriter {
    inner: Arc<Mutex<BoxedWriter>>,
}

impl ConnectionWriter {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Writes `bytes` and flushes, bounded by `write_timeout`.
    ///
    /// Waiting for another sender to release the handle counts against the
    /// same bound, so callers queued behind a stuck peer give up together.
    pub async fn send(&self, bytes: &[u8], write_timeout: Duration) -> Result<(), DeliveryError> {
        match timeout(write_timeout, async {
            let mut writer = self.inner.lock().await;
            writer.write_all(bytes).await?;
            writer.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DeliveryError::Io(e.to_string())),
            Err(_) => Err(DeliveryError::WriteTimeout),
        }
    }

    /// Shuts down the write direction. Errors are logged and ignored.
    pub async fn close(&self) {
        let mut writer = self.inner.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!(error = %e, "Shutdown of client writer failed");
        }
    }

    /// Returns true if both handles refer to the same connection.
    pub fn same_handle(&self, other: &ConnectionWriter) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ConnectionWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionWriter")
            .field("refs", &Arc::strong_count(&self.inner))
            .finish()
    }
}

// ============================================================================
// Connection Record
// ============================================================================

/// One joined client as seen by the registry.
///
/// Immutable after creation. Cloning is cheap and shares the same writer,
/// which is what registry snapshots rely on.
#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    info: Arc<ConnectionInfo>,
    writer: ConnectionWriter,
}

impl ConnectionRecord {
    pub fn new(info: ConnectionInfo, writer: ConnectionWriter) -> Self {
        Self {
            info: Arc::new(info),
            writer,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.info.id
    }

    pub fn username(&self) -> &Username {
        &self.info.username
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.info.peer_addr
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn writer(&self) -> &ConnectionWriter {
        &self.writer
    }
}

/// Errors that can occur writing to a single client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Write timeout")]
    WriteTimeout,
}
