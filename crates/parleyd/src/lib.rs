//! Parley Daemon - Connection registry and broadcast server
//!
//! This crate provides the core infrastructure for the chat relay:
//! - `registry` - Lock-guarded set of joined connections
//! - `broadcast` - Fan-out of one message to every other member
//! - `server` - TCP acceptor and per-connection session handler
//! - `config` - Server settings
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      parleyd relay                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   ChatServer    │     │         Registry            │   │
//! │  │ (TcpListener)   │     │ Mutex<HashMap<Id, Record>>  │   │
//! │  └────────┬────────┘     └──────────────▲──────────────┘   │
//! │           │ spawn per accept            │ add / remove /   │
//! │           ▼                             │ snapshot         │
//! │  ┌─────────────────┐     ┌──────────────┴──────────────┐   │
//! │  │ SessionHandler  │────▶│        Broadcaster          │   │
//! │  │  (per client)   │     │ (snapshot, write, prune)    │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Per-connection failures stay inside the owning session

pub mod broadcast;
pub mod config;
pub mod registry;
pub mod server;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use config::ServerConfig;
pub use registry::{ConnectionRecord, ConnectionWriter, DeliveryError, Registry};
pub use server::{ChatServer, ServerError, SessionError, SessionHandler, SessionState, SessionSummary};
