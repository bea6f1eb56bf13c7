//! Router loops
//!
//! Three independent dispatch loops, each draining its own queue:
//! broadcast fan-out, direct-message delivery, and registry updates.
//! Requests within one queue are handled strictly in arrival order;
//! there is no ordering across queues.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::message::{BroadcastMessage, DirectMessage};
use crate::participant::Participant;
use crate::registry::Registry;

/// Requests for the registry-update loop
#[derive(Debug)]
pub enum RegistryUpdate {
    /// Replace the entry under the participant's name, clean up
    ///
    /// Ignored when another connection actively holds the name.
    Upsert(Participant),
    /// Retire `retired` and register `participant` atomically, clean up
    ///
    /// `reply` carries whether the name was granted.
    Rename {
        retired: String,
        participant: Participant,
        reply: oneshot::Sender<bool>,
    },
}

/// Sending side of the three router queues
///
/// Cloned into every session.
#[derive(Debug, Clone)]
pub struct RouterHandle {
    broadcast_tx: mpsc::UnboundedSender<BroadcastMessage>,
    direct_tx: mpsc::UnboundedSender<DirectMessage>,
    update_tx: mpsc::UnboundedSender<RegistryUpdate>,
}

impl RouterHandle {
    /// Queue a broadcast
    pub fn broadcast(&self, msg: BroadcastMessage) -> Result<(), AppError> {
        self.broadcast_tx
            .send(msg)
            .map_err(|_| AppError::ChannelSend)
    }

    /// Queue a direct message
    pub fn direct(&self, msg: DirectMessage) -> Result<(), AppError> {
        self.direct_tx.send(msg).map_err(|_| AppError::ChannelSend)
    }

    /// Queue a registry update
    pub fn update(&self, update: RegistryUpdate) -> Result<(), AppError> {
        self.update_tx
            .send(update)
            .map_err(|_| AppError::ChannelSend)
    }

    /// Ask the update loop to move a participant from `retired` to its
    /// current name
    ///
    /// Resolves once the update has been applied; false means another
    /// connection holds the name.
    pub async fn claim(&self, retired: String, participant: Participant) -> Result<bool, AppError> {
        let (reply, granted) = oneshot::channel();
        self.update(RegistryUpdate::Rename {
            retired,
            participant,
            reply,
        })?;
        granted.await.map_err(|_| AppError::ChannelSend)
    }
}

/// Join handles of the running router loops
#[derive(Debug)]
pub struct RouterTasks {
    pub broadcast: JoinHandle<()>,
    pub direct: JoinHandle<()>,
    pub update: JoinHandle<()>,
}

/// The three router loops and their shared registry
pub struct Router {
    registry: Arc<Registry>,
    broadcast_rx: mpsc::UnboundedReceiver<BroadcastMessage>,
    direct_rx: mpsc::UnboundedReceiver<DirectMessage>,
    update_rx: mpsc::UnboundedReceiver<RegistryUpdate>,
}

impl Router {
    /// Create the router queues over the given registry
    pub fn new(registry: Arc<Registry>) -> (Self, RouterHandle) {
        let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();
        let (direct_tx, direct_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        let router = Self {
            registry,
            broadcast_rx,
            direct_rx,
            update_rx,
        };
        let handle = RouterHandle {
            broadcast_tx,
            direct_tx,
            update_tx,
        };
        (router, handle)
    }

    /// Spawn one task per loop
    ///
    /// Each loop runs until every `RouterHandle` has been dropped.
    pub fn spawn(self) -> RouterTasks {
        let Router {
            registry,
            broadcast_rx,
            direct_rx,
            update_rx,
        } = self;

        RouterTasks {
            broadcast: tokio::spawn(run_broadcast_loop(Arc::clone(&registry), broadcast_rx)),
            direct: tokio::spawn(run_direct_loop(Arc::clone(&registry), direct_rx)),
            update: tokio::spawn(run_update_loop(registry, update_rx)),
        }
    }
}

async fn run_broadcast_loop(
    registry: Arc<Registry>,
    mut receiver: mpsc::UnboundedReceiver<BroadcastMessage>,
) {
    debug!("Broadcast loop started");
    while let Some(msg) = receiver.recv().await {
        deliver_broadcast(&registry, &msg);
    }
    debug!("Broadcast loop shutting down");
}

async fn run_direct_loop(
    registry: Arc<Registry>,
    mut receiver: mpsc::UnboundedReceiver<DirectMessage>,
) {
    debug!("Direct-message loop started");
    while let Some(msg) = receiver.recv().await {
        deliver_direct(&registry, &msg);
    }
    debug!("Direct-message loop shutting down");
}

async fn run_update_loop(
    registry: Arc<Registry>,
    mut receiver: mpsc::UnboundedReceiver<RegistryUpdate>,
) {
    debug!("Registry-update loop started");
    while let Some(update) = receiver.recv().await {
        apply_update(&registry, update);
    }
    debug!("Registry-update loop shutting down");
}

/// Fan a broadcast out to every active participant except the sender
///
/// A recipient whose queue is full or closed misses the line; the
/// others are unaffected. Returns the number of successful deliveries.
pub(crate) fn deliver_broadcast(registry: &Registry, msg: &BroadcastMessage) -> usize {
    let line = msg.render();
    let mut delivered = 0;

    for recipient in registry.snapshot_active() {
        if recipient.name == msg.sender {
            continue;
        }
        match recipient.try_send(line.clone()) {
            Ok(()) => delivered += 1,
            Err(e) => warn!("Can't send message to {}: {}", recipient.name, e),
        }
    }

    info!("{}", line);
    delivered
}

/// Deliver a direct message, or bounce a failure notice to the sender
pub(crate) fn deliver_direct(registry: &Registry, msg: &DirectMessage) {
    if let Some(recipient) = registry.find_active(&msg.recipient) {
        if let Err(e) = recipient.try_send(msg.render()) {
            warn!("Can't send message to {}: {}", msg.recipient, e);
        }
        info!("DM from {} to {}: {}", msg.sender, msg.recipient, msg.body);
        return;
    }

    match registry.find_active(&msg.sender) {
        Some(sender) => {
            if let Err(e) = sender.try_send(msg.failure_notice()) {
                warn!("Can't send message to {}: {}", msg.sender, e);
            }
        }
        None => debug!(
            "Dropping DM from {} to {}: neither is in the chat",
            msg.sender, msg.recipient
        ),
    }
}

/// Apply one registry update followed by a cleanup pass
///
/// Returns whether the update was applied.
pub(crate) fn apply_update(registry: &Registry, update: RegistryUpdate) -> bool {
    let applied = match update {
        RegistryUpdate::Upsert(participant) => {
            debug!(
                "Upsert {} ({}), active: {}",
                participant.name, participant.id, participant.is_active
            );
            let (name, id) = (participant.name.clone(), participant.id.clone());
            let applied = registry.upsert(participant);
            if !applied {
                warn!("Ignoring update for {} from {}: name held by another client", name, id);
            }
            applied
        }
        RegistryUpdate::Rename {
            retired,
            participant,
            reply,
        } => {
            debug!("Rename {} -> {} ({})", retired, participant.name, participant.id);
            let granted = registry.replace(&retired, participant);
            // The session may already be gone
            let _ = reply.send(granted);
            granted
        }
    };

    let removed = registry.cleanup();
    debug!(
        "Registry cleanup removed {}, active participants: {}",
        removed,
        registry.count()
    );
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::Connection;
    use crate::types::ParticipantId;

    fn register(registry: &Registry, name: &str) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(32);
        let p = Participant::new(ParticipantId::new(name), Connection::new(tx));
        registry.add(name, p);
        rx
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let registry = Registry::new();
        let mut alice = register(&registry, "alice");
        let mut bob = register(&registry, "bob");
        let mut carol = register(&registry, "carol");

        let delivered = deliver_broadcast(&registry, &BroadcastMessage::new("alice", "hello"));

        assert_eq!(delivered, 2);
        assert_eq!(bob.recv().await.unwrap(), "alice: hello");
        assert_eq!(carol.recv().await.unwrap(), "alice: hello");
        assert!(alice.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_skips_tombstones() {
        let registry = Registry::new();
        let _alice = register(&registry, "alice");
        let (tx, mut ghost_rx) = mpsc::channel(32);
        let ghost = Participant::new(ParticipantId::new("ghost"), Connection::new(tx));
        registry.add("ghost", ghost.deactivated());

        deliver_broadcast(&registry, &BroadcastMessage::new("alice", "hi"));

        assert!(ghost_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_continues_after_write_failure() {
        let registry = Registry::new();
        let gone = register(&registry, "gone");
        drop(gone);
        let mut bob = register(&registry, "bob");

        let delivered = deliver_broadcast(&registry, &BroadcastMessage::new("alice", "hello"));

        assert_eq!(delivered, 1);
        assert_eq!(bob.recv().await.unwrap(), "alice: hello");
    }

    #[tokio::test]
    async fn test_direct_delivers_to_recipient_only() {
        let registry = Registry::new();
        let mut alice = register(&registry, "alice");
        let mut bob = register(&registry, "bob");

        deliver_direct(&registry, &DirectMessage::new("alice", "bob", "hi"));

        assert_eq!(bob.recv().await.unwrap(), "[DM] alice: hi");
        assert!(alice.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_direct_to_missing_recipient_notifies_sender_once() {
        let registry = Registry::new();
        let mut alice = register(&registry, "alice");
        let mut bob = register(&registry, "bob");

        deliver_direct(&registry, &DirectMessage::new("alice", "zed", "hi"));

        assert_eq!(
            alice.recv().await.unwrap(),
            "Failed to send DM: zed is not in the chat"
        );
        assert!(alice.try_recv().is_err());
        assert!(bob.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_direct_with_no_match_is_dropped() {
        let registry = Registry::new();
        let mut bob = register(&registry, "bob");

        deliver_direct(&registry, &DirectMessage::new("Server", "zed", "hi"));

        assert!(bob.try_recv().is_err());
    }

    #[test]
    fn test_upsert_inactive_is_cleaned_up() {
        let registry = Registry::new();
        let (tx, _rx) = mpsc::channel(1);
        let alice = Participant::new(ParticipantId::new("A1"), Connection::new(tx))
            .renamed("alice", true);
        apply_update(&registry, RegistryUpdate::Upsert(alice.clone()));
        assert!(registry.is_taken("alice"));

        apply_update(&registry, RegistryUpdate::Upsert(alice.deactivated()));

        assert!(!registry.has("alice"));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_rename_moves_key() {
        let registry = Registry::new();
        let (tx, _rx) = mpsc::channel(1);
        let p = Participant::new(ParticipantId::new("A1"), Connection::new(tx));
        apply_update(&registry, RegistryUpdate::Upsert(p.clone()));

        let (reply, mut granted) = oneshot::channel();
        assert!(apply_update(
            &registry,
            RegistryUpdate::Rename {
                retired: "A1".to_string(),
                participant: p.renamed("alice", true),
                reply,
            },
        ));

        assert_eq!(granted.try_recv(), Ok(true));
        assert!(!registry.has("A1"));
        assert!(registry.find_active("alice").unwrap().is_name_set);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_rename_to_name_held_by_other_client_is_refused() {
        let registry = Registry::new();
        let (tx, _rx) = mpsc::channel(1);
        let alice = Participant::new(ParticipantId::new("A1"), Connection::new(tx))
            .renamed("alice", true);
        let (tx, _rx) = mpsc::channel(1);
        let bob = Participant::new(ParticipantId::new("B1"), Connection::new(tx));
        apply_update(&registry, RegistryUpdate::Upsert(alice));
        apply_update(&registry, RegistryUpdate::Upsert(bob.clone()));

        let (reply, mut granted) = oneshot::channel();
        assert!(!apply_update(
            &registry,
            RegistryUpdate::Rename {
                retired: "B1".to_string(),
                participant: bob.renamed("alice", true),
                reply,
            },
        ));

        assert_eq!(granted.try_recv(), Ok(false));
        assert_eq!(
            registry.find_active("alice").unwrap().id,
            ParticipantId::new("A1")
        );
        assert!(registry.is_taken("B1"));
    }

    #[test]
    fn test_stale_tombstone_keeps_other_clients_entry() {
        let registry = Registry::new();
        let (tx, _rx) = mpsc::channel(1);
        let stale = Participant::new(ParticipantId::new("A1"), Connection::new(tx))
            .renamed("alice", true);
        let (tx, _rx) = mpsc::channel(1);
        let current = Participant::new(ParticipantId::new("B1"), Connection::new(tx))
            .renamed("alice", true);
        apply_update(&registry, RegistryUpdate::Upsert(current));

        assert!(!apply_update(
            &registry,
            RegistryUpdate::Upsert(stale.deactivated())
        ));

        assert_eq!(
            registry.find_active("alice").unwrap().id,
            ParticipantId::new("B1")
        );
    }

    #[test]
    fn test_full_queue_drops_line_for_that_recipient_only() {
        let registry = Registry::new();
        let (tx, mut slow_rx) = mpsc::channel(1);
        let slow = Participant::new(ParticipantId::new("slow"), Connection::new(tx));
        registry.add("slow", slow);
        let mut bob = register(&registry, "bob");

        assert_eq!(deliver_broadcast(&registry, &BroadcastMessage::new("alice", "one")), 2);
        assert_eq!(deliver_broadcast(&registry, &BroadcastMessage::new("alice", "two")), 1);

        assert_eq!(slow_rx.try_recv().unwrap(), "alice: one");
        assert!(slow_rx.try_recv().is_err());
        assert_eq!(bob.try_recv().unwrap(), "alice: one");
        assert_eq!(bob.try_recv().unwrap(), "alice: two");
    }

    #[tokio::test]
    async fn test_claim_resolves_after_update() {
        let registry = Arc::new(Registry::new());
        let (router, handle) = Router::new(Arc::clone(&registry));
        let _tasks = router.spawn();

        let (tx, _rx) = mpsc::channel(1);
        let p = Participant::new(ParticipantId::new("A1"), Connection::new(tx));
        handle.update(RegistryUpdate::Upsert(p.clone())).unwrap();

        let granted = handle
            .claim("A1".to_string(), p.renamed("alice", true))
            .await
            .unwrap();

        assert!(granted);
        assert!(registry.is_taken("alice"));
        assert!(!registry.has("A1"));
    }

    #[tokio::test]
    async fn test_spawned_loops_route_requests() {
        let registry = Arc::new(Registry::new());
        let (router, handle) = Router::new(Arc::clone(&registry));
        let tasks = router.spawn();

        let (tx, mut rx) = mpsc::channel(32);
        let bob = Participant::new(ParticipantId::new("bob"), Connection::new(tx));
        handle.update(RegistryUpdate::Upsert(bob)).unwrap();

        // Updates and broadcasts use separate queues; wait for the registration
        while !registry.is_taken("bob") {
            tokio::task::yield_now().await;
        }

        handle
            .broadcast(BroadcastMessage::new("alice", "hello"))
            .unwrap();
        assert_eq!(rx.recv().await.unwrap(), "alice: hello");

        handle
            .direct(DirectMessage::new("alice", "bob", "psst"))
            .unwrap();
        assert_eq!(rx.recv().await.unwrap(), "[DM] alice: psst");

        drop(handle);
        tasks.broadcast.await.unwrap();
        tasks.direct.await.unwrap();
        tasks.update.await.unwrap();
    }
}
