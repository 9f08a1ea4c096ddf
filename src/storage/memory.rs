//! In-memory storage, used for dry runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{Entity, EntityKind, PerKind};
use crate::storage::EntityStore;

/// Keeps every stored entity in memory, keyed by id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: PerKind<HashMap<String, Entity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a stored entity.
    pub fn get(&self, kind: EntityKind, id: &str) -> Option<&Entity> {
        self.records.get(kind).get(id)
    }

    /// All stored entities of `kind`, in no particular order.
    pub fn records(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.records.get(kind).values()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    fn exists(&self, kind: EntityKind, id: &str) -> bool {
        self.records.get(kind).contains_key(id)
    }

    async fn append(&mut self, entity: &Entity) -> Result<()> {
        let kind = entity.kind();
        let records = self.records.get_mut(kind);
        if records.contains_key(entity.id()) {
            return Err(AppError::duplicate(kind, entity.id()));
        }
        records.insert(entity.id().to_string(), entity.clone());
        Ok(())
    }

    fn known_count(&self, kind: EntityKind) -> usize {
        self.records.get(kind).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Artist;

    #[tokio::test]
    async fn test_get_returns_stored_entity() {
        let mut store = MemoryStore::new();
        let artist = Entity::from(Artist::new("a1", "Artist"));
        store.append(&artist).await.unwrap();

        assert_eq!(store.get(EntityKind::Artist, "a1"), Some(&artist));
        assert!(store.get(EntityKind::Track, "a1").is_none());
        assert_eq!(store.records(EntityKind::Artist).count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let mut store = MemoryStore::new();
        let artist = Entity::from(Artist::new("a1", "Artist"));
        store.append(&artist).await.unwrap();
        assert!(store.append(&artist).await.is_err());
        assert_eq!(store.known_count(EntityKind::Artist), 1);
    }
}
