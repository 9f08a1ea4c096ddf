//! Remote fetch backends.
//!
//! The crawl loop only depends on the [`Backend`] trait and its three-way
//! failure taxonomy. How an entity is extracted from the remote source is up
//! to the implementation.

mod http;
pub mod parse;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Entity, EntityKind};

pub use http::HttpBackend;

/// Result type alias for backend fetches.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Why a single fetch did not produce an entity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The entity does not exist at the source. Terminal for that id.
    #[error("entity not found")]
    NotFound,

    /// The source is throttling us. Recoverable by cooling down.
    #[error("rate limited by the remote source")]
    RateLimited,

    /// Transient network failure or an unusable response.
    #[error("connection error: {0}")]
    Connection(String),
}

impl FetchError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        Self::Connection(error.to_string())
    }
}

/// Fetches entities by kind and id.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch(&self, kind: EntityKind, id: &str) -> FetchResult<Entity>;
}
