//! Shared helpers for relay integration tests.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use parleyd::{ChatServer, Registry, ServerConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;

/// How long a test waits for an expected message.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Window used to assert that nothing else arrives.
pub const QUIET_PERIOD: Duration = Duration::from_millis(200);

/// Grace period for server shutdown
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_millis(100);

pub const PROMPT: &str = "Enter your username: ";

// ============================================================================
// Test Server
// ============================================================================

/// Relay bound to an ephemeral localhost port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Registry,
    cancel_token: CancellationToken,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let registry = Registry::new();
        let cancel_token = CancellationToken::new();

        let server = ChatServer::bind(
            ServerConfig::new("127.0.0.1", 0),
            registry.clone(),
            cancel_token.clone(),
        )
        .await
        .expect("bind test server");
        let addr = server.local_addr();

        tokio::spawn(server.run());

        TestServer {
            addr,
            registry,
            cancel_token,
        }
    }

    pub async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr)
            .await
            .expect("connect to server");
        TestClient::new(stream)
    }

    /// Connects and completes the handshake, returning the client after its
    /// welcome message has arrived.
    pub async fn join(&self, username: &str) -> TestClient {
        let mut client = self.connect().await;
        client.expect(PROMPT).await;
        client.send(username).await;
        client.expect("[SYSTEM] Welcome to the chat room! Online users: ").await;
        client
    }

    /// Waits until the registry holds exactly `expected` members.
    pub async fn wait_for_members(&self, expected: usize) {
        let deadline = Instant::now() + RECV_TIMEOUT;
        loop {
            let len = self.registry.len().await;
            if len == expected {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "registry has {len} members, expected {expected}"
            );
            sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        sleep(SHUTDOWN_GRACE_PERIOD).await;
    }
}

// ============================================================================
// Test Client
// ============================================================================

/// Raw TCP client that accumulates received text.
///
/// The relay does not frame messages, so several messages may arrive in one
/// read and one message may arrive across reads. `expect` consumes text up
/// to and including the awaited substring.
pub struct TestClient {
    pub stream: TcpStream,
    pending: String,
}

impl TestClient {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            pending: String::new(),
        }
    }

    pub fn local_port(&self) -> u16 {
        self.stream.local_addr().unwrap().port()
    }

    pub async fn send(&mut self, text: &str) {
        self.send_raw(text.as_bytes()).await;
    }

    pub async fn send_raw(&mut self, data: &[u8]) {
        self.stream.write_all(data).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Waits for `needle`, returning the text that preceded it.
    pub async fn expect(&mut self, needle: &str) -> String {
        let deadline = Instant::now() + RECV_TIMEOUT;
        loop {
            if let Some(pos) = self.pending.find(needle) {
                let before = self.pending[..pos].to_string();
                self.pending.drain(..pos + needle.len());
                return before;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let n = self
                .read_some(remaining)
                .await
                .unwrap_or_else(|| panic!("timed out waiting for {needle:?}, have {:?}", self.pending));
            assert!(
                n > 0,
                "connection closed while waiting for {needle:?}, have {:?}",
                self.pending
            );
        }
    }

    /// Reads for `window` and returns everything received, including text
    /// already buffered.
    pub async fn drain_for(&mut self, window: Duration) -> String {
        let deadline = Instant::now() + window;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.read_some(remaining).await {
                Some(0) | None => break,
                Some(_) => {}
            }
        }
        std::mem::take(&mut self.pending)
    }

    /// Returns true once the server has closed the connection.
    pub async fn is_closed_by_peer(&mut self) -> bool {
        matches!(self.read_some(RECV_TIMEOUT).await, Some(0))
    }

    async fn read_some(&mut self, within: Duration) -> Option<usize> {
        let mut buf = [0u8; 4096];
        match timeout(within, self.stream.read(&mut buf)).await {
            Ok(Ok(n)) => {
                self.pending.push_str(&String::from_utf8_lossy(&buf[..n]));
                Some(n)
            }
            Ok(Err(_)) => Some(0),
            Err(_) => None,
        }
    }
}
