//! Line protocol definitions
//!
//! Inbound lines are parsed into [`Command`]s by prefix. Outbound lines are
//! rendered from [`BroadcastMessage`] and [`DirectMessage`], which are also
//! the payloads of the router's broadcast and direct queues.

use crate::error::CommandError;
use crate::types::{ParticipantId, SERVER_NAME};

/// Client → Server command
///
/// Recognized by prefix, case-sensitive, in this priority order:
/// `!quit`, `!name`, `!dm`, then plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Leave the chat
    Quit,
    /// Request a new display name
    Name(String),
    /// Private message to a single participant
    Direct { recipient: String, body: String },
    /// Plain text, broadcast to everyone else
    Say(String),
}

impl Command {
    /// Parse one line (without its trailing newline)
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        if line.starts_with("!quit") {
            return Ok(Command::Quit);
        }

        if line.starts_with("!name") {
            return line
                .split_whitespace()
                .nth(1)
                .map(|name| Command::Name(name.to_string()))
                .ok_or(CommandError::MissingName);
        }

        if line.starts_with("!dm") {
            let mut tokens = line.split_whitespace().skip(1);
            let recipient = tokens.next().ok_or(CommandError::MissingDirectArgs)?;
            let body = tokens.collect::<Vec<_>>().join(" ");
            if body.is_empty() {
                return Err(CommandError::MissingDirectArgs);
            }
            return Ok(Command::Direct {
                recipient: recipient.to_string(),
                body,
            });
        }

        Ok(Command::Say(line.to_string()))
    }
}

/// A message for every active participant except the sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastMessage {
    pub sender: String,
    pub body: String,
}

impl BroadcastMessage {
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
        }
    }

    /// Announcement sent on behalf of the server
    pub fn announce(body: impl Into<String>) -> Self {
        Self::new(SERVER_NAME, body)
    }

    pub fn joined(name: &str, id: &ParticipantId) -> Self {
        Self::announce(format!("{} ({}) joined the chat", name, id))
    }

    pub fn left(name: &str, id: &ParticipantId) -> Self {
        Self::announce(format!("{} ({}) left the chat", name, id))
    }

    pub fn renamed(id: &ParticipantId, name: &str) -> Self {
        Self::announce(format!("Client {} is {}", id, name))
    }

    /// Wire form: `"{sender}: {body}"`
    pub fn render(&self) -> String {
        format!("{}: {}", self.sender, self.body)
    }
}

/// A message for a single named participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectMessage {
    pub sender: String,
    pub body: String,
    pub recipient: String,
}

impl DirectMessage {
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            recipient: recipient.into(),
        }
    }

    /// Wire form: `"[DM] {sender}: {body}"`
    pub fn render(&self) -> String {
        format!("[DM] {}: {}", self.sender, self.body)
    }

    /// Notice returned to the sender when the recipient is not active
    pub fn failure_notice(&self) -> String {
        format!("Failed to send DM: {} is not in the chat", self.recipient)
    }
}

/// Private notice from the server, rendered like a direct message
pub fn server_notice(body: impl std::fmt::Display) -> String {
    format!("[DM] {}: {}", SERVER_NAME, body)
}

/// Notice for a `!name` request that collided with an active participant
pub fn name_taken_notice(name: &str) -> String {
    server_notice(format!(
        "{} is already taken. Use `!name [your-name]` to change it",
        name
    ))
}
