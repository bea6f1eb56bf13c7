//! Participant struct definition
//!
//! Represents a connected chat identity and the handle used to write
//! lines to its connection.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::types::ParticipantId;

/// Writable side of a connection
///
/// Lines pushed here are drained into the socket by the connection's
/// writer task. Cloning shares the same connection; the registry holds
/// clones but never closes it.
#[derive(Debug, Clone)]
pub struct Connection {
    sender: mpsc::Sender<String>,
}

impl Connection {
    /// Wrap the sender half of a connection's outbound queue
    pub fn new(sender: mpsc::Sender<String>) -> Self {
        Self { sender }
    }

    /// Queue a line (without trailing newline) for delivery
    ///
    /// Returns an error if the writer is gone (client disconnected).
    pub async fn send(&self, line: impl Into<String>) -> Result<(), SendError> {
        self.sender
            .send(line.into())
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Queue a line without waiting for room
    ///
    /// Fails with `SendError::Full` if the reader has fallen behind.
    pub fn try_send(&self, line: impl Into<String>) -> Result<(), SendError> {
        self.sender.try_send(line.into()).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }
}

/// Connected participant information
#[derive(Debug, Clone)]
pub struct Participant {
    /// Stable identifier for this connection
    pub id: ParticipantId,
    /// Display name, defaults to the id
    pub name: String,
    /// Outbound line channel
    pub connection: Connection,
    /// Usable as a delivery target; false marks a tombstone
    pub is_active: bool,
    /// The user picked a name of their own
    pub is_name_set: bool,
}

impl Participant {
    /// Create an active participant named after its id
    pub fn new(id: ParticipantId, connection: Connection) -> Self {
        Self {
            name: id.to_string(),
            id,
            connection,
            is_active: true,
            is_name_set: false,
        }
    }

    /// Copy of this participant marked inactive
    pub fn deactivated(&self) -> Self {
        Self {
            is_active: false,
            ..self.clone()
        }
    }

    /// Copy of this participant registered under the given name
    pub fn renamed(&self, name: impl Into<String>, is_name_set: bool) -> Self {
        Self {
            name: name.into(),
            is_active: true,
            is_name_set,
            ..self.clone()
        }
    }

    /// Send a line to this participant
    pub async fn send(&self, line: impl Into<String>) -> Result<(), SendError> {
        self.connection.send(line).await
    }

    /// Send a line to this participant without waiting
    pub fn try_send(&self, line: impl Into<String>) -> Result<(), SendError> {
        self.connection.try_send(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(id: &str) -> (Participant, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(32);
        (Participant::new(ParticipantId::new(id), Connection::new(tx)), rx)
    }

    #[tokio::test]
    async fn test_participant_creation() {
        let (p, _rx) = participant("A1");

        assert_eq!(p.name, "A1");
        assert!(p.is_active);
        assert!(!p.is_name_set);
    }

    #[tokio::test]
    async fn test_participant_send() {
        let (p, mut rx) = participant("A1");

        p.send("hello").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_send_to_closed_connection() {
        let (p, rx) = participant("A1");
        drop(rx);

        assert!(matches!(
            p.send("hello").await,
            Err(SendError::ChannelClosed)
        ));
    }

    #[test]
    fn test_try_send_to_full_connection() {
        let (tx, mut rx) = mpsc::channel(1);
        let p = Participant::new(ParticipantId::new("A1"), Connection::new(tx));

        p.try_send("one").unwrap();
        assert!(matches!(p.try_send("two"), Err(SendError::Full)));

        assert_eq!(rx.try_recv().unwrap(), "one");
        drop(rx);
        assert!(matches!(p.try_send("three"), Err(SendError::ChannelClosed)));
    }

    #[test]
    fn test_renamed_and_deactivated() {
        let (p, _rx) = participant("A1");

        let named = p.renamed("alice", true);
        assert_eq!(named.name, "alice");
        assert_eq!(named.id, ParticipantId::new("A1"));
        assert!(named.is_name_set);

        let gone = named.deactivated();
        assert!(!gone.is_active);
        assert_eq!(gone.name, "alice");
    }
}
