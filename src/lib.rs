// src/lib.rs

//! Tracklist Crawler Library
//!
//! Incrementally crawls a music tracklist catalog (tracklists, tracks,
//! artists, labels) into append-only JSON-lines logs, with a resumable
//! frontier checkpoint between runs.

pub mod backend;
pub mod error;
pub mod frontier;
pub mod models;
pub mod pipeline;
pub mod storage;
pub mod utils;
