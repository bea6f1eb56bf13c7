//! Basic type definitions for the chat server
//!
//! Provides the `ParticipantId` newtype: the stable identity of a
//! connection, derived from its remote address.

use std::net::SocketAddr;

/// Display name reserved for server announcements and notices
pub const SERVER_NAME: &str = "Server";

/// Stable connection identifier (newtype pattern)
///
/// Assigned once when the connection is accepted and never changes,
/// even when the participant renames itself. Doubles as the default
/// display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Create an ID from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<SocketAddr> for ParticipantId {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.to_string())
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
