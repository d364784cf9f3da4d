//! Relay connection client.
//!
//! This module provides the `ChatClient` which handles:
//! - Connecting to the relay over TCP
//! - Forwarding received chunks to the caller as `ClientEvent`s
//! - Sending interactively entered lines, minus local commands
//!
//! The server speaks unframed text, so each `ClientEvent::Message` is one
//! read of at most `READ_CHUNK_SIZE` bytes, not necessarily one message.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use parley_protocol::{
    decode_chunk, ClientInput, DEFAULT_CLIENT_HOST, DEFAULT_PORT, READ_CHUNK_SIZE,
};

// ============================================================================
// Configuration
// ============================================================================

/// Where the client connects.
///
/// # Example
///
/// ```rust
/// use parley_client::client::ClientConfig;
///
/// let config = ClientConfig {
///     port: 9000,
///     ..Default::default()
/// };
/// assert_eq!(config.address(), "127.0.0.1:9000");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server host name or IP address.
    pub host: String,

    /// Server TCP port.
    pub port: u16,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port` string passed to the resolver.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_HOST, DEFAULT_PORT)
    }
}

// ============================================================================
// Events
// ============================================================================

/// Something the receive task observed on the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Text from the server, decoded lossily.
    Message(String),

    /// The server closed the connection.
    Disconnected,

    /// The connection failed.
    Error(String),
}

/// Why `ChatClient::run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user entered a quit command.
    UserQuit,

    /// Local input reached end of file.
    InputClosed,

    /// The server closed the connection or it failed.
    ServerClosed,

    /// The caller's cancellation token was triggered.
    Cancelled,
}

// ============================================================================
// Chat Client
// ============================================================================

/// Connected relay client.
///
/// # Example
///
/// ```rust,ignore
/// use parley_client::{ChatClient, ClientConfig};
/// use tokio::io::BufReader;
/// use tokio::sync::mpsc;
/// use tokio_util::sync::CancellationToken;
///
/// let (tx, mut rx) = mpsc::unbounded_channel();
/// let client = ChatClient::connect(ClientConfig::default()).await?;
/// let stdin = BufReader::new(tokio::io::stdin());
/// let outcome = client.run(stdin, tx, CancellationToken::new()).await?;
/// ```
pub struct ChatClient {
    config: ClientConfig,
    stream: TcpStream,
}

impl ChatClient {
    /// Opens the TCP connection.
    ///
    /// # Errors
    ///
    /// - `ClientError::ConnectionRefused` if nothing listens at the address
    /// - `ClientError::Connect` for every other connection failure
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let addr = config.address();

        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                info!(address = %addr, "Connected to relay");
                Ok(Self { config, stream })
            }
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                Err(ClientError::ConnectionRefused { addr })
            }
            Err(e) => Err(ClientError::Connect {
                addr,
                error: e.to_string(),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Runs the session until the user quits, input ends, the server goes
    /// away, or `cancel_token` is triggered.
    ///
    /// Each line from `input` is classified with `ClientInput::parse`:
    /// empty lines are skipped, quit commands end the session without
    /// sending anything, and all other lines are written as-is without
    /// their line terminator.
    ///
    /// On return the write half has been shut down and the receive task
    /// has stopped.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Io` if reading `input` fails.
    pub async fn run<I>(
        self,
        input: I,
        event_tx: mpsc::UnboundedSender<ClientEvent>,
        cancel_token: CancellationToken,
    ) -> Result<SessionEnd>
    where
        I: AsyncBufRead + Unpin,
    {
        let (reader, mut writer) = self.stream.into_split();

        // Stops both flows; the caller's token stays untouched.
        let session_token = cancel_token.child_token();
        let receiver = tokio::spawn(receive_loop(reader, event_tx.clone(), session_token.clone()));

        let mut lines = input.lines();
        let outcome = loop {
            tokio::select! {
                _ = session_token.cancelled() => {
                    if cancel_token.is_cancelled() {
                        break Ok(SessionEnd::Cancelled);
                    }
                    break Ok(SessionEnd::ServerClosed);
                }

                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => break Ok(SessionEnd::InputClosed),
                        Err(e) => break Err(ClientError::Io(e)),
                    };

                    match ClientInput::parse(&line) {
                        ClientInput::Empty => continue,
                        ClientInput::Quit => {
                            debug!("Quit command entered");
                            break Ok(SessionEnd::UserQuit);
                        }
                        ClientInput::Message(text) => {
                            if let Err(e) = send_line(&mut writer, text).await {
                                warn!(error = %e, "Failed to send message");
                                let _ = event_tx.send(ClientEvent::Error(e.to_string()));
                                break Ok(SessionEnd::ServerClosed);
                            }
                        }
                    }
                }
            }
        };

        if let Err(e) = writer.shutdown().await {
            debug!(error = %e, "Write half already closed");
        }
        session_token.cancel();
        if let Err(e) = receiver.await {
            warn!(error = %e, "Receive task panicked");
        }

        outcome
    }
}

async fn send_line<W>(writer: &mut W, text: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await
}

/// Forwards server chunks until EOF, an error, or cancellation.
///
/// Cancels `session_token` on exit so the input loop stops too.
async fn receive_loop(
    mut reader: OwnedReadHalf,
    event_tx: mpsc::UnboundedSender<ClientEvent>,
    session_token: CancellationToken,
) {
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        tokio::select! {
            _ = session_token.cancelled() => {
                debug!("Receive task cancelled");
                return;
            }

            result = reader.read(&mut buf) => match result {
                Ok(0) => {
                    info!("Server closed the connection");
                    let _ = event_tx.send(ClientEvent::Disconnected);
                    break;
                }
                Ok(n) => {
                    let text = decode_chunk(buf.get(..n).unwrap_or_default()).into_owned();
                    if event_tx.send(ClientEvent::Message(text)).is_err() {
                        debug!("Event channel closed, receive task exiting");
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Connection error");
                    let _ = event_tx.send(ClientEvent::Error(e.to_string()));
                    break;
                }
            }
        }
    }

    session_token.cancel();
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    async fn listener() -> (TcpListener, ClientConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, ClientConfig::new("127.0.0.1", port))
    }

    /// Accepts one connection and returns everything the client sent.
    fn record_peer(listener: TcpListener, greeting: &'static [u8]) -> tokio::task::JoinHandle<Vec<u8>> {
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(greeting).await.unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).await.unwrap();
            received
        })
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8888);
        assert_eq!(config.address(), "127.0.0.1:8888");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let (listener, config) = listener().await;
        drop(listener);

        let result = ChatClient::connect(config.clone()).await;
        match result {
            Err(ClientError::ConnectionRefused { addr }) => assert_eq!(addr, config.address()),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("connected to a closed port"),
        }
    }

    #[tokio::test]
    async fn test_lines_sent_without_terminator_until_quit() {
        let (listener, config) = listener().await;
        let peer = record_peer(listener, b"Enter your username: ");

        let client = ChatClient::connect(config).await.unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let input: &[u8] = b"alice\nhello\n/quit\nnever sent\n";

        let outcome = timeout(TEST_TIMEOUT, client.run(input, tx, CancellationToken::new()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome, SessionEnd::UserQuit);
        let received = timeout(TEST_TIMEOUT, peer).await.unwrap().unwrap();
        assert_eq!(received, b"alicehello");
    }

    #[tokio::test]
    async fn test_empty_lines_are_not_sent() {
        let (listener, config) = listener().await;
        let peer = record_peer(listener, b"");

        let client = ChatClient::connect(config).await.unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let input: &[u8] = b"\n\r\nbob\n\n";

        let outcome = timeout(TEST_TIMEOUT, client.run(input, tx, CancellationToken::new()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome, SessionEnd::InputClosed);
        let received = timeout(TEST_TIMEOUT, peer).await.unwrap().unwrap();
        assert_eq!(received, b"bob");
    }

    #[tokio::test]
    async fn test_server_close_ends_session() {
        let (listener, config) = listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"[SYSTEM] bye").await.unwrap();
        });

        let client = ChatClient::connect(config).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        // Input that never produces a line.
        let (_input_writer, input_reader) = tokio::io::duplex(64);
        let input = tokio::io::BufReader::new(input_reader);

        let outcome = timeout(TEST_TIMEOUT, client.run(input, tx, CancellationToken::new()))
            .await
            .unwrap()
            .unwrap();
        server.await.unwrap();

        assert_eq!(outcome, SessionEnd::ServerClosed);

        let mut text = String::new();
        let mut disconnected = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                ClientEvent::Message(chunk) => text.push_str(&chunk),
                ClientEvent::Disconnected => disconnected = true,
                ClientEvent::Error(e) => panic!("unexpected error event: {e}"),
            }
        }
        assert_eq!(text, "[SYSTEM] bye");
        assert!(disconnected);
    }

    #[tokio::test]
    async fn test_cancel_token_ends_session() {
        let (listener, config) = listener().await;
        let _peer = record_peer(listener, b"");

        let client = ChatClient::connect(config.clone()).await.unwrap();
        assert_eq!(client.config().address(), config.address());
        let (tx, _rx) = mpsc::unbounded_channel();
        let (_input_writer, input_reader) = tokio::io::duplex(64);
        let input = tokio::io::BufReader::new(input_reader);

        let cancel_token = CancellationToken::new();
        cancel_token.cancel();

        let outcome = timeout(TEST_TIMEOUT, client.run(input, tx, cancel_token))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, SessionEnd::Cancelled);
    }
}
