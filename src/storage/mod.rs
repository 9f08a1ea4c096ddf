//! Durable entity storage.
//!
//! The store is append-only: an entity is written once and never updated or
//! deleted. It exposes an existence check per kind, backed by an in-memory
//! index that is rebuilt from the store's own logs on startup.
//!
//! ## Directory Structure
//!
//! ```text
//! {root}/
//! ├── config.toml           # Crawler configuration
//! ├── todo.json             # Frontier checkpoint
//! ├── tracks.jsonl          # One JSON record per line
//! ├── artists.jsonl
//! ├── labels.jsonl
//! └── tracklists.jsonl
//! ```

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Entity, EntityKind};

// Re-export for convenience
pub use local::LocalStore;
pub use memory::MemoryStore;

/// How a store treats data already on disk when it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Replay existing logs into the index and keep appending to them
    Resume,
    /// Truncate existing logs and start empty
    Fresh,
}

/// Trait for entity storage backends.
#[async_trait]
pub trait EntityStore: Send {
    /// Whether an entity of `kind` with `id` has been stored.
    fn exists(&self, kind: EntityKind, id: &str) -> bool;

    /// Persist an entity. Fails if the id is already stored for its kind.
    async fn append(&mut self, entity: &Entity) -> Result<()>;

    /// Number of stored entities of `kind`.
    fn known_count(&self, kind: EntityKind) -> usize;
}
