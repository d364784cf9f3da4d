//! Parley Core - Shared types for the chat relay
//!
//! This crate provides the domain types shared between
//! the relay daemon (parleyd) and the terminal client (parley).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod connection;
pub mod username;

// Re-exports for convenience
pub use connection::{ConnectionId, ConnectionInfo};
pub use username::{Username, FALLBACK_USERNAME_PREFIX};
