//! Parley Protocol - Wire text for the chat relay
//!
//! The relay speaks raw UTF-8 over TCP with no framing: every server
//! message is written as-is, with no terminator or length prefix, and
//! every client read is capped at [`READ_CHUNK_SIZE`] bytes. This crate
//! holds the exact strings both sides agree on and the client-local
//! command parser.

pub mod input;
pub mod message;
pub mod wire;

pub use input::{ClientInput, QUIT_COMMANDS};
pub use message::{ServerMessage, USERNAME_PROMPT};
pub use wire::{
    decode_chunk, DEFAULT_CLIENT_HOST, DEFAULT_PORT, DEFAULT_SERVER_HOST, READ_CHUNK_SIZE,
};
