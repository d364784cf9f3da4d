//! Error types for the Parley client.
//!
//! Connection failures are split so the binary can tell "nothing is
//! listening" apart from other failures and print a hint for it.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::io;
use thiserror::Error;

// ============================================================================
// Client Error Type
// ============================================================================

/// Client errors.
///
/// # Example
///
/// ```rust
/// use parley_client::error::ClientError;
///
/// let err = ClientError::ConnectionRefused {
///     addr: "127.0.0.1:8888".to_string(),
/// };
/// assert_eq!(err.to_string(), "Could not connect to server at 127.0.0.1:8888");
/// ```
#[derive(Error, Debug)]
pub enum ClientError {
    /// Nothing is listening at the address.
    ///
    /// Usually the server is not running or the port is wrong.
    #[error("Could not connect to server at {addr}")]
    ConnectionRefused { addr: String },

    /// Any other connection failure (unresolvable host, unreachable network).
    #[error("Failed to connect to {addr}: {error}")]
    Connect { addr: String, error: String },

    /// I/O error passthrough.
    ///
    /// Reading local input failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Convenience Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

// ============================================================================
// Tests
// ============================================================================
