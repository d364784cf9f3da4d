//! Display names negotiated during the connection handshake.

use std::fmt;

/// Prefix for names generated when a client sends an empty username.
pub const FALLBACK_USERNAME_PREFIX: &str = "User_";

/// Display name of a connected client.
///
/// Assigned once at handshake and never changed afterwards. Duplicate names
/// across connections are allowed; identity is carried by `ConnectionId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Creates a username from an already-validated string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Builds the username from the text a client sent during handshake.
    ///
    /// Surrounding whitespace is stripped. Empty or whitespace-only input
    /// falls back to `User_<peer_port>`.
    pub fn from_handshake(raw: &str, peer_port: u16) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::fallback(peer_port)
        } else {
            Self(trimmed.to_string())
        }
    }

    /// Generated name for a client that did not pick one.
    pub fn fallback(peer_port: u16) -> Self {
        Self(format!("{FALLBACK_USERNAME_PREFIX}{peer_port}"))
    }

    /// Returns true if this name was generated rather than chosen.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.0
            .strip_prefix(FALLBACK_USERNAME_PREFIX)
            .is_some_and(|port| !port.is_empty() && port.parse::<u16>().is_ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Username {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_handshake_trims_whitespace() {
        let name = Username::from_handshake("  alice \r\n", 50000);
        assert_eq!(name.as_str(), "alice");
        assert!(!name.is_fallback());
    }

    #[test]
    fn test_empty_handshake_uses_peer_port() {
        let name = Username::from_handshake("", 51234);
        assert_eq!(name.as_str(), "User_51234");
        assert!(name.is_fallback());
    }

    #[test]
    fn test_whitespace_only_handshake_uses_peer_port() {
        let name = Username::from_handshake(" \t\n", 8080);
        assert_eq!(name, Username::fallback(8080));
    }

    #[test]
    fn test_inner_whitespace_is_kept() {
        let name = Username::from_handshake("Mary Ann\n", 1);
        assert_eq!(name.as_str(), "Mary Ann");
    }

    #[test]
    fn test_chosen_name_that_looks_generated() {
        assert!(Username::new("User_42").is_fallback());
        assert!(!Username::new("User_").is_fallback());
        assert!(!Username::new("User_bob").is_fallback());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Username::from("bob")), "bob");
    }
}
