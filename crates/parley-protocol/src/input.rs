//! Client-side interpretation of interactively entered lines.

/// Commands that end the client session locally. Compared case-insensitively.
pub const QUIT_COMMANDS: [&str; 3] = ["/quit", "/exit", "/q"];

/// What the client should do with one line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientInput<'a> {
    /// Nothing to send
    Empty,

    /// Leave the chat; nothing is sent to the server
    Quit,

    /// Text to send verbatim
    Message(&'a str),
}

impl<'a> ClientInput<'a> {
    /// Classifies one input line. A trailing CR/LF is ignored.
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        if line.is_empty() {
            return Self::Empty;
        }

        let command = line.trim();
        if QUIT_COMMANDS
            .iter()
            .any(|quit| command.eq_ignore_ascii_case(quit))
        {
            return Self::Quit;
        }

        Self::Message(line)
    }
}
