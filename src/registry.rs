//! Participant registry
//!
//! The only shared mutable state in the server: a map from display name
//! to participant behind a single mutex. Every operation, iteration
//! included, takes the lock just long enough to copy or mutate; network
//! I/O always happens on a snapshot after the lock is released.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::participant::Participant;

/// Thread-safe store of participants keyed by name
#[derive(Debug, Default)]
pub struct Registry {
    participants: Mutex<HashMap<String, Participant>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Participant>> {
        // Critical sections never leave the map half-updated
        self.participants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// True if any entry, active or tombstoned, exists under `name`
    pub fn has(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// True if an active participant holds `name`
    pub fn is_taken(&self, name: &str) -> bool {
        self.lock().get(name).is_some_and(|p| p.is_active)
    }

    /// Insert or overwrite the entry under `name`
    pub fn add(&self, name: impl Into<String>, participant: Participant) {
        self.lock().insert(name.into(), participant);
    }

    /// Delete the entry under `name`, if any
    pub fn remove(&self, name: &str) {
        self.lock().remove(name);
    }

    /// Store `participant` under its own name unless another connection
    /// holds that name actively
    ///
    /// Returns false, leaving the map untouched, when rejected.
    pub fn upsert(&self, participant: Participant) -> bool {
        let mut participants = self.lock();
        if held_by_other(&participants, &participant.name, &participant) {
            return false;
        }
        participants.insert(participant.name.clone(), participant);
        true
    }

    /// Retire `retired` and register `participant` under its own name
    /// in one critical section
    ///
    /// Rejected, leaving the map untouched, when another connection
    /// actively holds the new name. The retired entry is only removed
    /// if it belongs to the same connection.
    pub fn replace(&self, retired: &str, participant: Participant) -> bool {
        let mut participants = self.lock();
        if held_by_other(&participants, &participant.name, &participant) {
            return false;
        }
        if participants
            .get(retired)
            .is_some_and(|p| p.id == participant.id)
        {
            participants.remove(retired);
        }
        participants.insert(participant.name.clone(), participant);
        true
    }

    /// Drop every tombstone, returning how many were removed
    pub fn cleanup(&self) -> usize {
        let mut participants = self.lock();
        let before = participants.len();
        participants.retain(|_, p| p.is_active);
        before - participants.len()
    }

    /// Copy of all active participants
    pub fn snapshot_active(&self) -> Vec<Participant> {
        self.lock()
            .values()
            .filter(|p| p.is_active)
            .cloned()
            .collect()
    }

    /// Active participant registered under `name`
    pub fn find_active(&self, name: &str) -> Option<Participant> {
        self.lock().get(name).filter(|p| p.is_active).cloned()
    }

    /// Number of active participants
    pub fn count(&self) -> usize {
        self.lock().values().filter(|p| p.is_active).count()
    }
}

fn held_by_other(
    participants: &HashMap<String, Participant>,
    name: &str,
    claimant: &Participant,
) -> bool {
    participants
        .get(name)
        .is_some_and(|p| p.is_active && p.id != claimant.id)
}
