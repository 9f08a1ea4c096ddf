// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains the catalog entities, their kinds, media links and
//! the application configuration.

mod config;
mod entity;
mod kind;
mod media;

// Re-export all public types
pub use config::{Config, CrawlerConfig, ExportConfig, PathsConfig, SeedConfig};
pub use entity::{Artist, Entity, Label, Track, Tracklist};
pub use kind::{EntityKind, PerKind};
pub use media::MediaLink;
