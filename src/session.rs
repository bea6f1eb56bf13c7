//! Per-connection session
//!
//! Parses the line protocol and turns each line into router requests.
//! A session never touches the registry directly except to check
//! whether a requested name is taken; every name or activity change
//! round-trips through the router's update queue.

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio_util::codec::LinesCodecError;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::message::{name_taken_notice, server_notice, BroadcastMessage, Command, DirectMessage};
use crate::participant::Participant;
use crate::registry::Registry;
use crate::router::{RegistryUpdate, RouterHandle};
use crate::types::SERVER_NAME;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing read yet
    Connecting,
    /// Connected under the default name (the id)
    Unnamed,
    /// Connected under a name the user picked
    Named,
    /// Quit or connection closed
    Terminated,
}

/// One connection's command state machine
pub struct Session {
    participant: Participant,
    registry: Arc<Registry>,
    router: RouterHandle,
    state: SessionState,
}

impl Session {
    /// Wrap a freshly accepted participant; nothing is registered until `run`
    pub fn new(participant: Participant, registry: Arc<Registry>, router: RouterHandle) -> Self {
        Self {
            participant,
            registry,
            router,
            state: SessionState::Connecting,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// This session's view of its participant
    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    /// Drive the session over a stream of inbound lines
    ///
    /// Returns once the user quits or the stream ends; both paths
    /// announce the departure and deactivate the participant.
    pub async fn run<S>(&mut self, mut lines: S) -> Result<(), AppError>
    where
        S: Stream<Item = Result<String, LinesCodecError>> + Unpin,
    {
        self.start()?;

        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => {
                    if !self.handle_line(&line).await? {
                        return Ok(());
                    }
                }
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    // Framing does not resume after a decode error
                    warn!("Line too long from {}", self.participant.id);
                    self.notify(server_notice("Line too long, closing connection"))
                        .await;
                    break;
                }
                Err(LinesCodecError::Io(e)) => {
                    debug!("Read failed for {}: {}", self.participant.id, e);
                    break;
                }
            }
        }

        self.quit()
    }

    /// Register the participant and announce the arrival
    pub(crate) fn start(&mut self) -> Result<(), AppError> {
        if self.state != SessionState::Connecting {
            return Ok(());
        }

        self.router
            .update(RegistryUpdate::Upsert(self.participant.clone()))?;
        self.router.broadcast(BroadcastMessage::joined(
            &self.participant.name,
            &self.participant.id,
        ))?;
        self.state = SessionState::Unnamed;

        info!("Client {} joined", self.participant.id);
        Ok(())
    }

    /// Handle one inbound line
    ///
    /// Returns false once the session has terminated.
    pub(crate) async fn handle_line(&mut self, line: &str) -> Result<bool, AppError> {
        match Command::parse(line) {
            Ok(Command::Quit) => {
                self.quit()?;
                return Ok(false);
            }
            Ok(Command::Name(name)) => self.rename(name).await?,
            Ok(Command::Direct { recipient, body }) => {
                self.router.direct(DirectMessage::new(
                    self.participant.name.clone(),
                    recipient,
                    body,
                ))?;
            }
            Ok(Command::Say(text)) => {
                self.router
                    .broadcast(BroadcastMessage::new(self.participant.name.clone(), text))?;
            }
            Err(e) => {
                debug!("Malformed command from {}: {}", self.participant.id, e);
                self.notify(server_notice(e)).await;
            }
        }

        Ok(true)
    }

    async fn rename(&mut self, name: String) -> Result<(), AppError> {
        let id = self.participant.id.clone();

        // The registry check is only a fast path; two sessions can both
        // pass it, so the update loop has the final say
        if name != SERVER_NAME && !self.registry.is_taken(&name) {
            let named = self.participant.renamed(name.clone(), true);
            if self.claim(named.clone()).await? {
                self.participant = named;
                self.state = SessionState::Named;
                self.router
                    .broadcast(BroadcastMessage::renamed(&id, &self.participant.name))?;

                info!("Client {} is now '{}'", id, self.participant.name);
                return Ok(());
            }
        }

        if !self.participant.is_name_set {
            let fallback = self.participant.renamed(id.to_string(), false);
            if self.claim(fallback.clone()).await? {
                self.participant = fallback;
                self.router
                    .broadcast(BroadcastMessage::renamed(&id, id.as_str()))?;
            } else {
                warn!("Client {} could not fall back to its own id", id);
            }
        }

        info!("Client {} asked for taken name '{}'", id, name);
        self.notify(name_taken_notice(&name)).await;
        Ok(())
    }

    /// Move the participant from its current key to `participant.name`
    ///
    /// Waits for the update loop; false means another connection got
    /// there first.
    async fn claim(&self, participant: Participant) -> Result<bool, AppError> {
        self.router
            .claim(self.participant.name.clone(), participant)
            .await
    }

    /// Announce the departure and deactivate the participant
    fn quit(&mut self) -> Result<(), AppError> {
        if self.state == SessionState::Terminated {
            return Ok(());
        }
        self.state = SessionState::Terminated;

        self.router.broadcast(BroadcastMessage::left(
            &self.participant.name,
            &self.participant.id,
        ))?;
        self.router
            .update(RegistryUpdate::Upsert(self.participant.deactivated()))?;

        info!(
            "Client {} ({}) left",
            self.participant.name, self.participant.id
        );
        Ok(())
    }

    /// Write a private notice straight to this session's connection
    async fn notify(&self, line: String) {
        if let Err(e) = self.participant.send(line).await {
            debug!("Can't send notice to {}: {}", self.participant.id, e);
        }
    }
}
