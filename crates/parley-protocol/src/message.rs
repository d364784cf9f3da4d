//! Messages written by the relay to its clients.

use std::fmt;

use parley_core::Username;

/// Prompt sent immediately after accept. No trailing newline.
pub const USERNAME_PROMPT: &str = "Enter your username: ";

/// Messages sent from the relay to clients.
///
/// `Display` renders the exact bytes put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Username prompt, sent to a fresh connection
    Prompt,

    /// Private greeting sent only to the client that just joined
    Welcome {
        /// Members in the registry, including the new client
        online: usize,
    },

    /// Broadcast to everyone else when a client joins
    Joined { username: Username },

    /// Broadcast to the remaining clients when a client leaves
    Left { username: Username },

    /// A relayed chat chunk
    Chat { username: Username, text: String },
}

impl ServerMessage {
    pub fn welcome(online: usize) -> Self {
        Self::Welcome { online }
    }

    pub fn joined(username: &Username) -> Self {
        Self::Joined {
            username: username.clone(),
        }
    }

    pub fn left(username: &Username) -> Self {
        Self::Left {
            username: username.clone(),
        }
    }

    pub fn chat(username: &Username, text: impl Into<String>) -> Self {
        Self::Chat {
            username: username.clone(),
            text: text.into(),
        }
    }

    /// Renders the message as wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prompt => f.write_str(USERNAME_PROMPT),
            Self::Welcome { online } => {
                write!(f, "[SYSTEM] Welcome to the chat room! Online users: {online}")
            }
            Self::Joined { username } => write!(f, "[SYSTEM] {username} joined the chat room!"),
            Self::Left { username } => write!(f, "[SYSTEM] {username} left the chat room."),
            Self::Chat { username, text } => write!(f, "[{username}] {text}"),
        }
    }
}
