//! Parley Client - Library for the terminal chat client
//!
//! # Architecture
//!
//! A connected client runs two flows that share one `CancellationToken`:
//!
//! 1. **Receive Task**: reads server chunks and forwards them as
//!    [`ClientEvent`]s for the binary to print
//! 2. **Input Loop**: reads local lines, handles `/quit`, and writes
//!    everything else to the server
//!
//! Either flow ending stops the other.

pub mod client;
pub mod error;

pub use client::{ChatClient, ClientConfig, ClientEvent, SessionEnd};
pub use error::{ClientError, Result};
