//! Server settings.

use std::time::Duration;

use parley_protocol::{DEFAULT_PORT, DEFAULT_SERVER_HOST, READ_CHUNK_SIZE};

/// Default bound on a single write to one client (10 seconds).
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the relay server.
///
/// # Example
///
/// ```rust
/// use parleyd::ServerConfig;
///
/// let config = ServerConfig {
///     host: "127.0.0.1".to_string(),
///     port: 0,
///     ..Default::default()
/// };
/// assert_eq!(config.address(), "127.0.0.1:0");
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host or IP address to bind.
    pub host: String,

    /// TCP port to bind. `0` lets the OS pick one.
    pub port: u16,

    /// Maximum bytes taken by a single receive on a client connection.
    pub read_chunk_size: usize,

    /// Writes to a client that take longer than this count as failed.
    pub write_timeout: Duration,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// `host:port` string suitable for address resolution.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_PORT,
            read_chunk_size: READ_CHUNK_SIZE,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}
