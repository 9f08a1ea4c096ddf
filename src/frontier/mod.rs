//! Crawl frontier: the per-kind sets of ids that are referenced but not yet
//! fetched.
//!
//! The frontier wraps an [`EntityStore`]. The store is the source of truth for
//! what is done; the pending sets only record what is queued. New work is
//! only ever discovered from the edges of an entity being stored.

pub mod checkpoint;

use std::collections::{BTreeSet, HashSet};

use crate::error::Result;
use crate::models::{Entity, EntityKind, PerKind};
use crate::storage::EntityStore;

/// Serializable snapshot of the pending sets.
pub type FrontierState = PerKind<BTreeSet<String>>;

/// Dedup worklist layered over an entity store.
pub struct Frontier<S> {
    store: S,
    pending: PerKind<HashSet<String>>,
    skipped_known: usize,
}

impl<S: EntityStore> Frontier<S> {
    /// Create a frontier with empty pending sets.
    pub fn new(store: S) -> Self {
        Self {
            store,
            pending: PerKind::default(),
            skipped_known: 0,
        }
    }

    /// Create a frontier from a checkpoint. Ids the store already knows are
    /// left out.
    pub fn with_state(store: S, state: FrontierState) -> Self {
        let mut frontier = Self::new(store);
        frontier.restore(state);
        frontier
    }

    /// Merge a checkpoint into the pending sets.
    pub fn restore(&mut self, state: FrontierState) {
        for kind in EntityKind::ALL {
            for id in state.get(kind) {
                self.enqueue(kind, id);
            }
        }
    }

    /// Queue an id for fetching. Returns `false` if it is already stored or
    /// already pending.
    pub fn enqueue(&mut self, kind: EntityKind, id: &str) -> bool {
        if self.store.exists(kind, id) {
            return false;
        }
        self.pending.get_mut(kind).insert(id.to_string())
    }

    /// Store a fetched entity and queue every unseen id it references.
    pub async fn put(&mut self, entity: &Entity) -> Result<()> {
        self.store.append(entity).await?;

        let kind = entity.kind();
        self.pending.get_mut(kind).remove(entity.id());

        for (target, id) in entity.edges() {
            if self.enqueue(target, id) {
                log::trace!("Discovered {} '{}' via {} '{}'", target, id, kind, entity.id());
            }
        }
        Ok(())
    }

    /// Remove and return an arbitrary pending id of `kind`.
    ///
    /// Ids that were stored through another path after being queued are
    /// dropped here instead of being returned.
    pub fn take_pending(&mut self, kind: EntityKind) -> Option<String> {
        loop {
            let set = self.pending.get_mut(kind);
            let id = set.iter().next()?.clone();
            set.remove(&id);

            if self.store.exists(kind, &id) {
                log::debug!("Skipping {} '{}': already stored", kind, id);
                self.skipped_known += 1;
                continue;
            }
            return Some(id);
        }
    }

    /// Whether the store already holds this entity.
    pub fn has(&self, kind: EntityKind, id: &str) -> bool {
        self.store.exists(kind, id)
    }

    pub fn is_pending(&self, kind: EntityKind, id: &str) -> bool {
        self.pending.get(kind).contains(id)
    }

    pub fn pending_count(&self, kind: EntityKind) -> usize {
        self.pending.get(kind).len()
    }

    pub fn pending_counts(&self) -> PerKind<usize> {
        self.pending.map(HashSet::len)
    }

    /// True when no kind has pending ids.
    pub fn is_empty(&self) -> bool {
        EntityKind::ALL
            .iter()
            .all(|kind| self.pending.get(*kind).is_empty())
    }

    /// Ids dropped at dequeue time because they were already stored.
    pub fn skipped_known(&self) -> usize {
        self.skipped_known
    }

    /// Copy of the pending sets for checkpointing.
    pub fn snapshot(&self) -> FrontierState {
        self.pending.map(|set| set.iter().cloned().collect())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}
