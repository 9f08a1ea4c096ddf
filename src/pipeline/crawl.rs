// src/pipeline/crawl.rs

//! Crawl controller.
//!
//! A single cooperative worker. Each pass visits the kinds in priority order
//! (tracklists, tracks, artists, labels) and fetches at most one id per kind.
//! Every wait is raced against the cancellation token, and the pending sets
//! are checkpointed once on the way out, whatever the reason for stopping.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, FetchError, HttpBackend};
use crate::error::Result;
use crate::frontier::{Frontier, checkpoint};
use crate::models::{Config, CrawlerConfig, EntityKind, PerKind};
use crate::storage::{EntityStore, LocalStore, StoreMode};

/// Crawl the live site into the logs under `storage_dir`.
///
/// In [`StoreMode::Resume`] the pending sets come from the checkpoint when
/// one exists; otherwise (and always in [`StoreMode::Fresh`]) the configured
/// seed ids are queued.
pub async fn run_crawler(
    config: &Config,
    storage_dir: &Path,
    mode: StoreMode,
    cancel: CancellationToken,
) -> Result<CrawlSummary> {
    let store = LocalStore::open(storage_dir, mode).await?;
    for kind in EntityKind::ALL {
        log::info!("Loaded {} known {}", store.known_count(kind), kind.plural());
    }

    let checkpoint_path = config.paths.checkpoint_path(storage_dir);
    let restored = match mode {
        StoreMode::Resume => checkpoint::load(&checkpoint_path).await?,
        StoreMode::Fresh => None,
    };

    let frontier = match restored {
        Some(state) => {
            log::info!("Resuming from checkpoint {}", checkpoint_path.display());
            Frontier::with_state(store, state)
        }
        None => {
            let mut frontier = Frontier::new(store);
            let seed = config.seed.per_kind();
            for kind in EntityKind::ALL {
                for id in seed.get(kind) {
                    if frontier.enqueue(kind, id) {
                        log::info!("Seeded {} '{}'", kind, id);
                    }
                }
            }
            frontier
        }
    };

    let backend = HttpBackend::new(&config.crawler)?;
    let mut controller = CrawlController::new(
        frontier,
        backend,
        CrawlSettings::from(&config.crawler),
        checkpoint_path,
        cancel,
    );
    controller.run().await
}

/// Timing and limits for a crawl.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Pause after every completed fetch
    pub request_delay: Duration,
    /// Pause after the source signals a rate limit
    pub rate_limit_cooldown: Duration,
    /// Stop after this many stored entities
    pub max_fetches: Option<u64>,
}

impl From<&CrawlerConfig> for CrawlSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            request_delay: config.request_delay(),
            rate_limit_cooldown: config.rate_limit_cooldown(),
            max_fetches: config.max_fetches,
        }
    }
}

/// Controller lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlState {
    Running,
    /// Cooling down after a rate limit
    Draining,
    /// Cancellation observed, heading for the final checkpoint
    Stopping,
    Stopped,
}

/// Why the controller stopped issuing fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every pending set ran dry
    Exhausted,
    Cancelled,
    /// `max_fetches` entities were stored
    FetchCap,
}

/// Result of a finished crawl.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub fetched: u64,
    pub not_found: u64,
    pub connection_failures: u64,
    pub rate_limits: u64,
    pub skipped_known: usize,
    pub stop_reason: StopReason,
    pub final_state: CrawlState,
    pub pending: PerKind<usize>,
}

impl CrawlSummary {
    pub fn elapsed(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }
}

#[derive(Debug, Default)]
struct Counters {
    fetched: u64,
    not_found: u64,
    connection_failures: u64,
    rate_limits: u64,
}

/// Outcome of one fetch attempt.
enum Step {
    Stored,
    NotFound,
    ConnectionFailed,
    RateLimited,
    Cancelled,
}

/// Drives a [`Frontier`] against a [`Backend`].
pub struct CrawlController<S, B> {
    frontier: Frontier<S>,
    backend: B,
    settings: CrawlSettings,
    checkpoint_path: PathBuf,
    cancel: CancellationToken,
    state: CrawlState,
    counters: Counters,
}

impl<S: EntityStore, B: Backend> CrawlController<S, B> {
    pub fn new(
        frontier: Frontier<S>,
        backend: B,
        settings: CrawlSettings,
        checkpoint_path: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            frontier,
            backend,
            settings,
            checkpoint_path: checkpoint_path.into(),
            cancel,
            state: CrawlState::Running,
            counters: Counters::default(),
        }
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    pub fn frontier(&self) -> &Frontier<S> {
        &self.frontier
    }

    pub fn into_frontier(self) -> Frontier<S> {
        self.frontier
    }

    /// Crawl until the frontier is exhausted, the fetch cap is hit or the
    /// token is cancelled, then write the checkpoint.
    ///
    /// Store errors abort the crawl. The checkpoint is still attempted before
    /// the error is returned.
    pub async fn run(&mut self) -> Result<CrawlSummary> {
        let start_time = Utc::now();
        self.state = CrawlState::Running;
        log::info!(
            "Crawl starting, pending: {}",
            pending_report(&self.frontier.pending_counts())
        );

        let outcome = self.crawl().await;
        if self.state != CrawlState::Stopping && self.cancel.is_cancelled() {
            self.state = CrawlState::Stopping;
        }

        let saved = checkpoint::save(&self.frontier.snapshot(), &self.checkpoint_path).await;
        self.state = CrawlState::Stopped;

        let stop_reason = match outcome {
            Ok(reason) => reason,
            Err(e) => {
                match saved {
                    Ok(()) => log::info!(
                        "Checkpoint written to {} after error",
                        self.checkpoint_path.display()
                    ),
                    Err(save_err) => log::error!("Best-effort checkpoint failed: {}", save_err),
                }
                return Err(e);
            }
        };
        saved?;
        log::info!("Checkpoint written to {}", self.checkpoint_path.display());

        let summary = CrawlSummary {
            start_time,
            end_time: Utc::now(),
            fetched: self.counters.fetched,
            not_found: self.counters.not_found,
            connection_failures: self.counters.connection_failures,
            rate_limits: self.counters.rate_limits,
            skipped_known: self.frontier.skipped_known(),
            stop_reason,
            final_state: self.state,
            pending: self.frontier.pending_counts(),
        };

        log::info!(
            "Crawl finished ({:?}) in {}s: fetched={} not_found={} connection_failures={} rate_limits={}",
            summary.stop_reason,
            summary.elapsed().num_seconds(),
            summary.fetched,
            summary.not_found,
            summary.connection_failures,
            summary.rate_limits
        );
        Ok(summary)
    }

    async fn crawl(&mut self) -> Result<StopReason> {
        loop {
            if self.frontier.is_empty() {
                return Ok(StopReason::Exhausted);
            }

            for kind in EntityKind::PRIORITY {
                if let Some(reason) = self.should_stop() {
                    return Ok(reason);
                }
                let Some(id) = self.frontier.take_pending(kind) else {
                    continue;
                };

                match self.attempt(kind, &id).await? {
                    Step::Stored | Step::NotFound => {
                        if !self.pause(self.settings.request_delay).await {
                            return Ok(StopReason::Cancelled);
                        }
                    }
                    Step::ConnectionFailed => break,
                    Step::RateLimited => {
                        self.state = CrawlState::Draining;
                        if !self.pause(self.settings.rate_limit_cooldown).await {
                            return Ok(StopReason::Cancelled);
                        }
                        self.state = CrawlState::Running;
                        break;
                    }
                    Step::Cancelled => return Ok(StopReason::Cancelled),
                }
            }

            log::info!(
                "Pending: {}",
                pending_report(&self.frontier.pending_counts())
            );
        }
    }

    fn should_stop(&mut self) -> Option<StopReason> {
        if self.cancel.is_cancelled() {
            self.state = CrawlState::Stopping;
            return Some(StopReason::Cancelled);
        }
        match self.settings.max_fetches {
            Some(cap) if self.counters.fetched >= cap => {
                log::info!("Reached fetch cap of {}", cap);
                Some(StopReason::FetchCap)
            }
            _ => None,
        }
    }

    /// Fetch one taken id and store the result.
    async fn attempt(&mut self, kind: EntityKind, id: &str) -> Result<Step> {
        // A fetch that has already completed wins over a racing cancellation.
        let fetched = tokio::select! {
            biased;
            result = self.backend.fetch(kind, id) => Some(result),
            _ = self.cancel.cancelled() => None,
        };

        let Some(result) = fetched else {
            log::info!("Abandoning in-flight fetch of {} '{}'", kind, id);
            self.frontier.enqueue(kind, id);
            self.state = CrawlState::Stopping;
            return Ok(Step::Cancelled);
        };

        match result {
            Ok(entity) => {
                if entity.kind() != kind || entity.id() != id {
                    self.counters.connection_failures += 1;
                    log::warn!(
                        "Requested {} '{}' but got {} '{}', discarding response",
                        kind,
                        id,
                        entity.kind(),
                        entity.id()
                    );
                    return Ok(Step::ConnectionFailed);
                }
                if let Err(e) = self.frontier.put(&entity).await {
                    log::error!("Could not store {} '{}': {}", kind, id, e);
                    self.frontier.enqueue(kind, id);
                    return Err(e);
                }
                self.counters.fetched += 1;
                log::debug!("Stored {} '{}' ({})", kind, id, entity.name());
                Ok(Step::Stored)
            }
            Err(FetchError::NotFound) => {
                self.counters.not_found += 1;
                log::info!("{} '{}' does not exist, dropping it", kind, id);
                Ok(Step::NotFound)
            }
            Err(FetchError::RateLimited) => {
                self.counters.rate_limits += 1;
                log::warn!(
                    "Ran into rate limit on {} '{}', waiting {}s",
                    kind,
                    id,
                    self.settings.rate_limit_cooldown.as_secs()
                );
                Ok(Step::RateLimited)
            }
            Err(FetchError::Connection(message)) => {
                self.counters.connection_failures += 1;
                log::warn!("Connection error on {} '{}': {}", kind, id, message);
                Ok(Step::ConnectionFailed)
            }
        }
    }

    /// Sleep unless cancelled first. Returns `false` on cancellation.
    async fn pause(&mut self, duration: Duration) -> bool {
        let completed = tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        };
        if !completed {
            self.state = CrawlState::Stopping;
        }
        completed
    }
}

fn pending_report(counts: &PerKind<usize>) -> String {
    format!(
        "tracks={} artists={} labels={} tracklists={}",
        counts.tracks, counts.artists, counts.labels, counts.tracklists
    )
}
