//! Transport defaults and raw chunk decoding.

use std::borrow::Cow;

/// Default TCP port for both server and client.
pub const DEFAULT_PORT: u16 = 8888;

/// Default bind host for the server (all interfaces).
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";

/// Default server host the client connects to.
pub const DEFAULT_CLIENT_HOST: &str = "127.0.0.1";

/// Maximum bytes consumed by a single receive.
///
/// Messages longer than this are delivered as several chunks and never
/// reassembled.
pub const READ_CHUNK_SIZE: usize = 1024;

/// Decodes one received chunk as UTF-8.
///
/// Invalid sequences (including a multi-byte character split across two
/// chunks) are replaced with U+FFFD rather than treated as an error.
pub fn decode_chunk(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}
