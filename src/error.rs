//! Error types for the chat server
//!
//! Defines application-level errors, delivery errors and command
//! parse errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// These end a single connection (or startup), never the router loops.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Router queue closed (fatal - internal channel broken)
    #[error("Router channel closed")]
    ChannelSend,
}

/// Message send errors
///
/// Occurs when delivering to a connection whose writer has gone away.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The connection's outbound queue is full
    #[error("Outbound queue full")]
    Full,
}

/// Malformed command arguments
///
/// Recoverable: the display text is sent back to the user as a usage notice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// `!name` without a name
    #[error("Usage: !name <your-name>")]
    MissingName,

    /// `!dm` without a recipient or body
    #[error("Usage: !dm <recipient> <message>")]
    MissingDirectArgs,
}
