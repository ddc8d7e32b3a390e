//! Correlation table: the pending/sent identifier-to-action map set.
//!
//! An action lives in at most one of two partitions at any time:
//! `pending` from registration until the moment it is written to the wire,
//! `sent` from the write until its response arrives. Both partitions sit
//! behind a single mutex held only for the map mutation itself, never
//! across wire I/O.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::action::{Action, ActionId};
use crate::error::ClientError;

#[derive(Debug, Default)]
struct Partitions {
    pending: HashMap<ActionId, Arc<Action>>,
    sent: HashMap<ActionId, Arc<Action>>,
}

/// Tracks which actions are registered versus in flight.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    partitions: Mutex<Partitions>,
}

impl CorrelationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an action into the `pending` partition.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::DuplicateActionId` if the identifier is already
    /// live in either partition. Identifiers are random UUIDs, so a
    /// collision is an invariant violation, not a recoverable condition.
    pub fn register(&self, action: &Arc<Action>) -> Result<(), ClientError> {
        let mut partitions = self.lock();
        let id = action.id();
        if partitions.pending.contains_key(id) || partitions.sent.contains_key(id) {
            return Err(ClientError::DuplicateActionId(id.clone()));
        }
        partitions.pending.insert(id.clone(), Arc::clone(action));
        Ok(())
    }

    /// Move an action from `pending` to `sent`, immediately before the wire
    /// write, so a response racing the write is never lost.
    ///
    /// Internally enqueued actions (the actions-connection login) skip
    /// registration, so an identifier absent from `pending` is tolerated:
    /// the action still lands in `sent` and its response correlates
    /// normally.
    pub fn promote(&self, action: &Arc<Action>) {
        let mut partitions = self.lock();
        partitions.pending.remove(action.id());
        partitions
            .sent
            .insert(action.id().clone(), Arc::clone(action));
    }

    /// Remove and return the `sent` entry for `id`, or `None` if there is
    /// no in-flight action with that identifier.
    pub fn resolve(&self, id: &ActionId) -> Option<Arc<Action>> {
        self.lock().sent.remove(id)
    }

    /// Drop a registration that never reached the send queue.
    pub(crate) fn remove_pending(&self, id: &ActionId) -> Option<Arc<Action>> {
        self.lock().pending.remove(id)
    }

    /// Remove and return every live action from both partitions. Used at
    /// client teardown so no waiter is left suspended on a slot that can
    /// never be written.
    pub(crate) fn drain(&self) -> Vec<Arc<Action>> {
        let mut partitions = self.lock();
        let mut live: Vec<Arc<Action>> = partitions.pending.drain().map(|(_, a)| a).collect();
        live.extend(partitions.sent.drain().map(|(_, a)| a));
        live
    }

    /// Whether the identifier is live in either partition.
    pub fn contains(&self, id: &ActionId) -> bool {
        let partitions = self.lock();
        partitions.pending.contains_key(id) || partitions.sent.contains_key(id)
    }

    /// Number of registered-but-unwritten actions.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of in-flight actions awaiting a response.
    pub fn sent_len(&self) -> usize {
        self.lock().sent.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Partitions> {
        self.partitions.lock().expect("correlation lock poisoned")
    }
}
